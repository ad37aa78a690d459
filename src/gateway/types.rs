//! Request and response shapes exchanged with the control plane.
//!
//! Response shapes mirror the wire encoding (`PascalCase` keys, numeric
//! fields that may be out of range, text flags). The observed-state mapper
//! turns them into the canonical model.

use serde::{Deserialize, Serialize};

use crate::model::{ChargeMode, MountPointKey, ProtocolType, StorageClass, VolumeId};

/// Parameters for creating a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateVolumeRequest {
    /// Volume name; always set so a lost response can be traced back.
    pub name: String,
    /// Protocol exposed to clients.
    pub protocol: ProtocolType,
    /// Storage tier.
    pub storage_class: StorageClass,
    /// Size in gigabytes.
    pub size_gb: u64,
    /// Billing mode.
    pub charge_mode: ChargeMode,
    /// Optional remark.
    pub remark: Option<String>,
    /// Optional business group tag.
    pub tag: Option<String>,
    /// Optional number of billing periods.
    pub quantity: Option<u32>,
}

/// Filter and page window for listing volumes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeQuery {
    /// Restricts the listing to one volume.
    pub volume_id: Option<VolumeId>,
    /// Index of the first item to return.
    pub offset: u64,
    /// Maximum number of items to return.
    pub limit: u64,
}

/// Parameters for renaming or re-annotating a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpdateVolumeInfoRequest {
    /// Target volume.
    pub volume_id: VolumeId,
    /// New name.
    pub name: Option<String>,
    /// New remark.
    pub remark: Option<String>,
}

/// Parameters for adding a mount point.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MountPointRequest {
    /// Owning volume.
    pub volume_id: VolumeId,
    /// VPC and subnet.
    pub key: MountPointKey,
    /// Mount point name.
    pub name: String,
}

/// Response to a create request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreatedVolume {
    /// Identifier assigned by the control plane.
    pub volume_id: String,
    /// Name recorded by the control plane.
    #[serde(default, rename = "VolumeName")]
    pub name: String,
    /// Initial lifecycle status, when reported.
    #[serde(default, rename = "VolumeStatus")]
    pub status: Option<String>,
}

/// Volume as encoded by the control plane.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawVolume {
    /// Volume identifier.
    pub volume_id: String,
    /// Volume name.
    pub volume_name: String,
    /// Remark.
    pub remark: String,
    /// Size in gigabytes.
    pub size: i64,
    /// Consumed size in gigabytes.
    pub used_size: i64,
    /// Storage tier token.
    pub storage_type: String,
    /// Protocol token.
    pub protocol_type: String,
    /// Expiration time as a Unix timestamp; zero when not billed by period.
    pub expired_time: i64,
    /// Expiry flag encoded as text.
    pub is_expired: String,
    /// Maximum mount point count.
    pub max_mount_point_num: i64,
    /// Current mount point count.
    pub total_mount_point_num: i64,
    /// Business group tag.
    pub tag: Option<String>,
    /// Lifecycle status, when reported.
    pub volume_status: Option<String>,
    /// Creation time as a Unix timestamp.
    pub create_time: i64,
}

/// One page of a volume listing.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VolumePage {
    /// Volumes on this page.
    #[serde(rename = "DataSet", default)]
    pub volumes: Vec<RawVolume>,
    /// Total number of volumes matching the query.
    #[serde(rename = "TotalCount", default)]
    pub total_count: u64,
}

/// Mount point as encoded by the control plane.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawMountPoint {
    /// Mount point name.
    pub mount_point_name: String,
    /// VPC identifier.
    pub vpc_id: String,
    /// Subnet identifier.
    pub subnet_id: String,
    /// Address clients mount from.
    pub mount_point_ip: Option<String>,
    /// Creation time as a Unix timestamp.
    pub create_time: i64,
}

/// Mount point listing for one volume.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountPointPage {
    /// Mount points attached to the volume.
    #[serde(rename = "DataSet")]
    pub mount_points: Vec<RawMountPoint>,
    /// Maximum mount point count.
    pub max_mount_point_num: i64,
    /// Current mount point count.
    pub total_mount_point_num: i64,
}
