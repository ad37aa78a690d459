//! Remote gateway contract used by the reconciler.
//!
//! The gateway exposes one method per logical control-plane operation and
//! returns classified [`GatewayError`]s. Wire encoding, transport and request
//! signing stay behind the trait; [`http::HttpGateway`] is the JSON-over-HTTP
//! implementation and `test_support::FakeGateway` an in-memory one.

mod error;
pub mod http;
mod types;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::model::{MountPointKey, VolumeId};

pub use error::{ErrorKind, GatewayError};
pub use types::{
    CreateVolumeRequest, CreatedVolume, MountPointPage, MountPointRequest, RawMountPoint,
    RawVolume, UpdateVolumeInfoRequest, VolumePage, VolumeQuery,
};

/// Named control-plane operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Operation {
    /// Provision a new volume.
    CreateVolume,
    /// List volumes, optionally filtered by identifier.
    ReadVolumes,
    /// Grow a volume to a new absolute size.
    ExtendVolume,
    /// Change the name and remark of a volume.
    UpdateVolumeInfo,
    /// Delete a volume.
    RemoveVolume,
    /// List the mount points of a volume.
    ReadMountPoints,
    /// Attach a mount point to a volume.
    AddMountPoint,
    /// Detach a mount point from a volume.
    RemoveMountPoint,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::CreateVolume,
        Self::ReadVolumes,
        Self::ExtendVolume,
        Self::UpdateVolumeInfo,
        Self::RemoveVolume,
        Self::ReadMountPoints,
        Self::AddMountPoint,
        Self::RemoveMountPoint,
    ];

    /// Action name used on the wire and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateVolume => "CreateVolume",
            Self::ReadVolumes => "DescribeVolumes",
            Self::ExtendVolume => "ExtendVolume",
            Self::UpdateVolumeInfo => "UpdateVolumeInfo",
            Self::RemoveVolume => "RemoveVolume",
            Self::ReadMountPoints => "DescribeMountPoints",
            Self::AddMountPoint => "AddMountPoint",
            Self::RemoveMountPoint => "RemoveMountPoint",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region and project scoping attached to every request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GatewayContext {
    /// Region the volume lives in.
    pub region: String,
    /// Project used for billing and ownership.
    pub project_id: String,
}

impl GatewayContext {
    /// Creates a context, trimming string fields.
    #[must_use]
    pub fn new(region: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            region: region.into().trim().to_owned(),
            project_id: project_id.into().trim().to_owned(),
        }
    }
}

/// Future returned by gateway operations.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Control-plane operations required by the reconciler.
pub trait Gateway: Send + Sync {
    /// Creates a volume. Not idempotent.
    fn create_volume<'a>(&'a self, request: &'a CreateVolumeRequest)
    -> GatewayFuture<'a, CreatedVolume>;

    /// Lists one page of volumes.
    fn read_volumes<'a>(&'a self, query: &'a VolumeQuery) -> GatewayFuture<'a, VolumePage>;

    /// Grows a volume to `size_gb`.
    fn extend_volume<'a>(&'a self, volume_id: &'a VolumeId, size_gb: u64)
    -> GatewayFuture<'a, ()>;

    /// Changes the name and remark of a volume.
    fn update_volume_info<'a>(
        &'a self,
        request: &'a UpdateVolumeInfoRequest,
    ) -> GatewayFuture<'a, ()>;

    /// Deletes a volume.
    fn remove_volume<'a>(&'a self, volume_id: &'a VolumeId) -> GatewayFuture<'a, ()>;

    /// Lists the mount points of a volume.
    fn read_mount_points<'a>(&'a self, volume_id: &'a VolumeId)
    -> GatewayFuture<'a, MountPointPage>;

    /// Attaches a mount point.
    fn add_mount_point<'a>(&'a self, request: &'a MountPointRequest) -> GatewayFuture<'a, ()>;

    /// Detaches the mount point identified by `key`.
    fn remove_mount_point<'a>(
        &'a self,
        volume_id: &'a VolumeId,
        key: &'a MountPointKey,
    ) -> GatewayFuture<'a, ()>;
}
