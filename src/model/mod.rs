//! Canonical entity shapes shared by the differ, mapper and reconciler.
//!
//! Desired shapes (`*Spec`) come from the caller and are validated before any
//! remote mutation. Observed shapes (`*State`) are rebuilt from the control
//! plane on every pass and never cached.

mod error;
mod ids;
mod mount_point;
mod volume;

use serde::{Deserialize, Serialize};

pub use error::ValidationError;
pub use ids::{SubnetId, VolumeId, VpcId};
pub use mount_point::{
    MountPointInventory, MountPointKey, MountPointSet, MountPointSpec, MountPointState,
};
pub use volume::{
    ChargeMode, ProtocolType, SizeRule, SizeRules, StorageClass, VolumeSpec, VolumeState,
};

/// Normalized view of a volume and its mount points taken in one pass.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Observed volume attributes.
    pub volume: VolumeState,
    /// Observed mount points and capacity.
    pub mount_points: MountPointInventory,
}

#[cfg(test)]
mod tests;
