//! Validation errors raised before any remote mutation is attempted.

use thiserror::Error;

use super::{MountPointKey, StorageClass, VolumeId};

/// Errors raised when desired state violates a model invariant.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// Raised when a required field is empty or blank.
    #[error("missing or empty field: {0}")]
    EmptyField(String),
    /// Raised when the requested size is below the storage-class minimum.
    #[error("{storage_class} volumes must be at least {minimum_gb} GB, got {size_gb} GB")]
    SizeBelowMinimum {
        /// Storage class of the volume.
        storage_class: StorageClass,
        /// Minimum size for the storage class.
        minimum_gb: u64,
        /// Requested size.
        size_gb: u64,
    },
    /// Raised when the requested size is not a multiple of the step.
    #[error("{storage_class} volume size must be a multiple of {step_gb} GB, got {size_gb} GB")]
    SizeNotMultiple {
        /// Storage class of the volume.
        storage_class: StorageClass,
        /// Required step multiple.
        step_gb: u64,
        /// Requested size.
        size_gb: u64,
    },
    /// Raised when the desired size is smaller than the observed size.
    #[error("volume {volume_id} cannot shrink from {observed_gb} GB to {desired_gb} GB")]
    Shrink {
        /// Volume being reconciled.
        volume_id: VolumeId,
        /// Size reported by the control plane.
        observed_gb: u64,
        /// Size requested by the caller.
        desired_gb: u64,
    },
    /// Raised when a field that is fixed at creation differs from the observed value.
    #[error("{field} of volume {volume_id} cannot change from {observed} to {desired}")]
    ImmutableField {
        /// Volume being reconciled.
        volume_id: VolumeId,
        /// Name of the immutable field.
        field: &'static str,
        /// Value reported by the control plane.
        observed: String,
        /// Value requested by the caller.
        desired: String,
    },
    /// Raised when a billing quantity of zero is requested.
    #[error("quantity must be positive when provided")]
    ZeroQuantity,
    /// Raised when two desired mount points share a VPC and subnet.
    #[error("duplicate mount point for {0}")]
    DuplicateMountPoint(MountPointKey),
    /// Raised when a mount point names a different owning volume.
    #[error("mount point {key} belongs to volume {owner}, not {volume_id}")]
    MountPointOwner {
        /// Mount point key.
        key: MountPointKey,
        /// Volume named by the desired mount point.
        owner: VolumeId,
        /// Volume being reconciled.
        volume_id: VolumeId,
    },
    /// Raised when the planned mount points exceed the volume's capacity.
    #[error("volume {volume_id} allows {maximum} mount points, plan requires {projected}")]
    MountPointCapacity {
        /// Volume being reconciled.
        volume_id: VolumeId,
        /// Maximum reported by the control plane.
        maximum: u32,
        /// Count after applying the plan.
        projected: usize,
    },
}
