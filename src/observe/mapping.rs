//! Translation of wire shapes into canonical entities.

use crate::gateway::{MountPointPage, RawMountPoint, RawVolume};
use crate::model::{
    MountPointInventory, MountPointKey, MountPointState, ProtocolType, StorageClass, VolumeId,
    VolumeState,
};

use super::ObserveError;

const EXPIRED_TOKEN: &str = "yes";

/// Interprets the text expiry flag. Only `yes` (any case, surrounding
/// whitespace ignored) is true.
#[must_use]
pub fn is_expired(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case(EXPIRED_TOKEN)
}

fn unsigned<T: TryFrom<i64>>(
    volume_id: &str,
    field: &'static str,
    value: i64,
) -> Result<T, ObserveError> {
    T::try_from(value).map_err(|_| ObserveError::Mapping {
        volume_id: volume_id.to_owned(),
        field,
        value: value.to_string(),
    })
}

fn timestamp(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|seconds| *seconds > 0)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

/// Maps a raw volume into a [`VolumeState`].
///
/// # Errors
///
/// Returns [`ObserveError::Mapping`] for negative counts or sizes and for
/// unknown storage class or protocol tokens.
pub fn map_volume(raw: &RawVolume) -> Result<VolumeState, ObserveError> {
    let id = raw.volume_id.as_str();
    if id.trim().is_empty() {
        return Err(ObserveError::Mapping {
            volume_id: String::new(),
            field: "VolumeId",
            value: raw.volume_id.clone(),
        });
    }
    let storage_class =
        StorageClass::from_wire(&raw.storage_type).ok_or_else(|| ObserveError::Mapping {
            volume_id: id.to_owned(),
            field: "StorageType",
            value: raw.storage_type.clone(),
        })?;
    let protocol =
        ProtocolType::from_wire(&raw.protocol_type).ok_or_else(|| ObserveError::Mapping {
            volume_id: id.to_owned(),
            field: "ProtocolType",
            value: raw.protocol_type.clone(),
        })?;

    Ok(VolumeState {
        volume_id: VolumeId::new(id),
        name: raw.volume_name.clone(),
        remark: raw.remark.clone(),
        size_gb: unsigned(id, "Size", raw.size)?,
        used_size_gb: unsigned(id, "UsedSize", raw.used_size)?,
        storage_class,
        protocol,
        expires_at: timestamp(raw.expired_time),
        expired: is_expired(&raw.is_expired),
        max_mount_points: unsigned(id, "MaxMountPointNum", raw.max_mount_point_num)?,
        mount_point_count: unsigned(id, "TotalMountPointNum", raw.total_mount_point_num)?,
        tag: non_empty(raw.tag.as_deref()),
        created_at: timestamp(raw.create_time),
        status: non_empty(raw.volume_status.as_deref()),
    })
}

fn map_mount_point(volume_id: &VolumeId, raw: &RawMountPoint) -> MountPointState {
    MountPointState {
        volume_id: volume_id.clone(),
        name: raw.mount_point_name.clone(),
        key: MountPointKey::new(raw.vpc_id.as_str(), raw.subnet_id.as_str()),
        address: non_empty(raw.mount_point_ip.as_deref()),
        created_at: timestamp(raw.create_time),
    }
}

/// Maps a mount point listing into a [`MountPointInventory`].
///
/// # Errors
///
/// Returns [`ObserveError::Mapping`] when a count is negative or out of range.
pub fn map_mount_points(
    volume_id: &VolumeId,
    page: &MountPointPage,
) -> Result<MountPointInventory, ObserveError> {
    Ok(MountPointInventory {
        volume_id: volume_id.clone(),
        entries: page
            .mount_points
            .iter()
            .map(|raw| map_mount_point(volume_id, raw))
            .collect(),
        max_count: unsigned(volume_id, "MaxMountPointNum", page.max_mount_point_num)?,
        current_count: unsigned(volume_id, "TotalMountPointNum", page.total_mount_point_num)?,
    })
}
