//! Mount point desired and observed shapes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{SubnetId, ValidationError, VolumeId, VpcId};

/// Identity of a mount point within a volume: one per VPC and subnet.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MountPointKey {
    /// VPC the mount point lives in.
    pub vpc_id: VpcId,
    /// Subnet the mount point lives in.
    pub subnet_id: SubnetId,
}

impl MountPointKey {
    /// Builds a key from VPC and subnet identifiers.
    #[must_use]
    pub fn new(vpc_id: impl Into<VpcId>, subnet_id: impl Into<SubnetId>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            subnet_id: subnet_id.into(),
        }
    }
}

impl fmt::Display for MountPointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vpc_id, self.subnet_id)
    }
}

/// Desired mount point.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MountPointSpec {
    /// Mount point name.
    pub name: String,
    /// VPC the mount point is created in.
    pub vpc_id: VpcId,
    /// Subnet the mount point is created in.
    pub subnet_id: SubnetId,
    /// Owning volume. When absent the mount point binds to the reconciled volume.
    #[serde(default)]
    pub volume_id: Option<VolumeId>,
}

impl MountPointSpec {
    /// Creates a desired mount point.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        vpc_id: impl Into<VpcId>,
        subnet_id: impl Into<SubnetId>,
    ) -> Self {
        Self {
            name: name.into().trim().to_owned(),
            vpc_id: vpc_id.into(),
            subnet_id: subnet_id.into(),
            volume_id: None,
        }
    }

    /// Pins the mount point to an owning volume.
    #[must_use]
    pub fn volume_id(mut self, value: impl Into<VolumeId>) -> Self {
        self.volume_id = Some(value.into());
        self
    }

    /// Returns the `(VPC, subnet)` key.
    #[must_use]
    pub fn key(&self) -> MountPointKey {
        MountPointKey {
            vpc_id: self.vpc_id.clone(),
            subnet_id: self.subnet_id.clone(),
        }
    }
}

/// Desired mount points keyed by `(VPC, subnet)`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MountPointSet {
    entries: BTreeMap<MountPointKey, MountPointSpec>,
}

impl MountPointSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builds a set, rejecting blank fields and duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateMountPoint`] when two specs share
    /// a key, or [`ValidationError::EmptyField`] when a field is blank.
    pub fn from_specs(
        specs: impl IntoIterator<Item = MountPointSpec>,
    ) -> Result<Self, ValidationError> {
        let mut set = Self::new();
        for spec in specs {
            set.insert(spec)?;
        }
        Ok(set)
    }

    /// Adds a spec to the set.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the key already exists or a field is
    /// blank.
    pub fn insert(&mut self, spec: MountPointSpec) -> Result<(), ValidationError> {
        if spec.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("mount_points.name".to_owned()));
        }
        if spec.vpc_id.is_empty() {
            return Err(ValidationError::EmptyField("mount_points.vpc_id".to_owned()));
        }
        if spec.subnet_id.is_empty() {
            return Err(ValidationError::EmptyField(
                "mount_points.subnet_id".to_owned(),
            ));
        }
        let key = spec.key();
        if self.entries.contains_key(&key) {
            return Err(ValidationError::DuplicateMountPoint(key));
        }
        self.entries.insert(key, spec);
        Ok(())
    }

    /// Looks up a spec by key.
    #[must_use]
    pub fn get(&self, key: &MountPointKey) -> Option<&MountPointSpec> {
        self.entries.get(key)
    }

    /// Iterates over specs in key order.
    pub fn iter(&self) -> impl Iterator<Item = &MountPointSpec> {
        self.entries.values()
    }

    /// Number of desired mount points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no mount points are desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that every spec either omits its owner or names `volume_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MountPointOwner`] for the first spec bound
    /// to another volume.
    pub fn check_owner(&self, volume_id: &VolumeId) -> Result<(), ValidationError> {
        for spec in self.iter() {
            if let Some(owner) = spec.volume_id.as_ref().filter(|owner| *owner != volume_id) {
                return Err(ValidationError::MountPointOwner {
                    key: spec.key(),
                    owner: owner.clone(),
                    volume_id: volume_id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Mount point as reported by the control plane.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MountPointState {
    /// Owning volume.
    pub volume_id: VolumeId,
    /// Mount point name.
    pub name: String,
    /// VPC and subnet.
    pub key: MountPointKey,
    /// Address clients mount from.
    pub address: Option<String>,
    /// Creation time as a Unix timestamp.
    pub created_at: Option<u64>,
}

/// Observed mount points of one volume together with its capacity.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MountPointInventory {
    /// Owning volume.
    pub volume_id: VolumeId,
    /// Mount points currently attached.
    pub entries: Vec<MountPointState>,
    /// Maximum number of mount points the volume accepts.
    pub max_count: u32,
    /// Number of mount points the control plane reports as attached.
    pub current_count: u32,
}

impl MountPointInventory {
    /// Looks up an observed mount point by key.
    #[must_use]
    pub fn get(&self, key: &MountPointKey) -> Option<&MountPointState> {
        self.entries.iter().find(|entry| &entry.key == key)
    }

    /// Count used for capacity planning: the larger of the reported count and
    /// the listed entries.
    #[must_use]
    pub fn occupied(&self) -> usize {
        usize::try_from(self.current_count)
            .unwrap_or(usize::MAX)
            .max(self.entries.len())
    }
}
