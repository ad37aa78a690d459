//! Computes the ordered steps that move observed state to desired state.
//!
//! The differ is pure: it reads a [`VolumeSpec`], a [`MountPointSet`] and a
//! [`Snapshot`] and either returns a [`Plan`] or a [`ValidationError`]. No
//! step of a rejected plan is ever issued.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gateway::Operation;
use crate::model::{
    MountPointInventory, MountPointKey, MountPointSet, MountPointSpec, Snapshot, ValidationError,
    VolumeSpec, VolumeState,
};

/// One remote mutation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Provision the volume with the given name.
    CreateVolume {
        /// Name sent with the create request.
        name: String,
    },
    /// Set the name and remark to these target values.
    UpdateInfo {
        /// Target name.
        name: String,
        /// Target remark.
        remark: String,
    },
    /// Grow the volume to an absolute size.
    Extend {
        /// Target size in gigabytes.
        size_gb: u64,
    },
    /// Detach the mount point with this key.
    RemoveMountPoint {
        /// VPC and subnet of the mount point.
        key: MountPointKey,
    },
    /// Attach a mount point.
    AddMountPoint {
        /// Desired mount point.
        spec: MountPointSpec,
    },
    /// Delete the volume.
    RemoveVolume,
}

impl Step {
    /// Gateway operation that realizes the step.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::CreateVolume { .. } => Operation::CreateVolume,
            Self::UpdateInfo { .. } => Operation::UpdateVolumeInfo,
            Self::Extend { .. } => Operation::ExtendVolume,
            Self::RemoveMountPoint { .. } => Operation::RemoveMountPoint,
            Self::AddMountPoint { .. } => Operation::AddMountPoint,
            Self::RemoveVolume => Operation::RemoveVolume,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateVolume { name } => write!(f, "create volume {name:?}"),
            Self::UpdateInfo { name, remark } => {
                write!(f, "update info to name {name:?} remark {remark:?}")
            }
            Self::Extend { size_gb } => write!(f, "extend to {size_gb} GB"),
            Self::RemoveMountPoint { key } => write!(f, "remove mount point {key}"),
            Self::AddMountPoint { spec } => {
                write!(f, "add mount point {:?} at {}", spec.name, spec.key())
            }
            Self::RemoveVolume => f.write_str("remove volume"),
        }
    }
}

/// Attribute changes for the volume itself.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeDiff {
    /// Target name and remark, when either differs.
    pub info: Option<(String, String)>,
    /// Target size, when larger than observed.
    pub extend_to: Option<u64>,
}

impl VolumeDiff {
    /// Returns `true` when the volume attributes already match.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.info.is_none() && self.extend_to.is_none()
    }
}

/// Mount point additions and removals. The two lists never share a key.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MountPointPlan {
    /// Observed keys that must be detached, in key order.
    pub to_remove: Vec<MountPointKey>,
    /// Desired mount points that must be attached, in key order.
    pub to_add: Vec<MountPointSpec>,
}

impl MountPointPlan {
    /// Returns `true` when the observed mount points already match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Complete set of changes for one converge pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Plan {
    /// Volume attribute changes.
    pub volume: VolumeDiff,
    /// Mount point changes.
    pub mount_points: MountPointPlan,
}

impl Plan {
    /// Returns `true` when nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volume.is_empty() && self.mount_points.is_empty()
    }

    /// Steps in execution order: info update, extend, removals, additions.
    #[must_use]
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = Vec::new();
        if let Some((name, remark)) = &self.volume.info {
            steps.push(Step::UpdateInfo {
                name: name.clone(),
                remark: remark.clone(),
            });
        }
        if let Some(size_gb) = self.volume.extend_to {
            steps.push(Step::Extend { size_gb });
        }
        steps.extend(
            self.mount_points
                .to_remove
                .iter()
                .map(|key| Step::RemoveMountPoint { key: key.clone() }),
        );
        steps.extend(
            self.mount_points
                .to_add
                .iter()
                .map(|spec| Step::AddMountPoint { spec: spec.clone() }),
        );
        steps
    }
}

/// Diffs volume attributes.
///
/// # Errors
///
/// Returns [`ValidationError::ImmutableField`] when the storage class or
/// protocol differ, and [`ValidationError::Shrink`] when the desired size is
/// smaller than observed. Immutable fields are checked first.
pub fn diff_volume(spec: &VolumeSpec, state: &VolumeState) -> Result<VolumeDiff, ValidationError> {
    if spec.storage_class != state.storage_class {
        return Err(ValidationError::ImmutableField {
            volume_id: state.volume_id.clone(),
            field: "storage_class",
            observed: state.storage_class.to_string(),
            desired: spec.storage_class.to_string(),
        });
    }
    if spec.protocol != state.protocol {
        return Err(ValidationError::ImmutableField {
            volume_id: state.volume_id.clone(),
            field: "protocol",
            observed: state.protocol.to_string(),
            desired: spec.protocol.to_string(),
        });
    }
    if spec.size_gb < state.size_gb {
        return Err(ValidationError::Shrink {
            volume_id: state.volume_id.clone(),
            observed_gb: state.size_gb,
            desired_gb: spec.size_gb,
        });
    }

    // Unset desired values keep whatever the control plane holds.
    let name = spec.name.as_deref().unwrap_or(&state.name);
    let remark = spec.remark.as_deref().unwrap_or(&state.remark);
    let info = (name != state.name || remark != state.remark)
        .then(|| (name.to_owned(), remark.to_owned()));
    let extend_to = (spec.size_gb > state.size_gb).then_some(spec.size_gb);

    Ok(VolumeDiff { info, extend_to })
}

/// Diffs mount points by `(VPC, subnet)` key: to-add is desired minus
/// observed and to-remove is observed minus desired. Names are not part of
/// the identity, so a key present on both sides produces nothing.
#[must_use]
pub fn diff_mount_points(desired: &MountPointSet, observed: &MountPointInventory) -> MountPointPlan {
    let mut to_remove: Vec<MountPointKey> = observed
        .entries
        .iter()
        .filter(|entry| desired.get(&entry.key).is_none())
        .map(|entry| entry.key.clone())
        .collect();
    to_remove.sort();
    to_remove.dedup();

    let to_add = desired
        .iter()
        .filter(|spec| {
            let key = spec.key();
            match observed.get(&key) {
                Some(entry) if entry.name != spec.name => {
                    tracing::debug!(%key, observed = %entry.name, desired = %spec.name, "mount point name differs; keeping");
                    false
                }
                Some(_) => false,
                None => true,
            }
        })
        .cloned()
        .collect();

    MountPointPlan { to_remove, to_add }
}

/// Builds the full plan for one pass and checks it against the volume's
/// mount point capacity.
///
/// # Errors
///
/// Returns [`ValidationError`] when a mount point names another volume, an
/// attribute diff is rejected, or the projected mount point count exceeds the
/// observed maximum.
pub fn plan(
    spec: &VolumeSpec,
    mount_points: &MountPointSet,
    snapshot: &Snapshot,
) -> Result<Plan, ValidationError> {
    let volume_id = &snapshot.volume.volume_id;
    mount_points.check_owner(volume_id)?;
    let volume = diff_volume(spec, &snapshot.volume)?;
    let mount_point_plan = diff_mount_points(mount_points, &snapshot.mount_points);

    if !mount_point_plan.to_add.is_empty() {
        let projected = snapshot
            .mount_points
            .occupied()
            .saturating_sub(mount_point_plan.to_remove.len())
            .saturating_add(mount_point_plan.to_add.len());
        let maximum = snapshot.mount_points.max_count;
        if projected > usize::try_from(maximum).unwrap_or(usize::MAX) {
            return Err(ValidationError::MountPointCapacity {
                volume_id: volume_id.clone(),
                maximum,
                projected,
            });
        }
    }

    Ok(Plan {
        volume,
        mount_points: mount_point_plan,
    })
}

#[cfg(test)]
mod tests;
