//! Fetches remote state and normalizes it into the canonical model.

mod mapping;

use thiserror::Error;

use crate::gateway::{ErrorKind, Gateway, Operation, VolumeQuery};
use crate::model::{MountPointInventory, Snapshot, VolumeId, VolumeState};
use crate::retry::{Retrier, RetryFailure};

pub use mapping::{is_expired, map_mount_points, map_volume};

/// Default number of volumes requested per page.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Errors raised while observing remote state.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ObserveError {
    /// Raised when the control plane does not know the volume.
    #[error("volume {volume_id} not found")]
    NotFound {
        /// Identifier that was looked up.
        volume_id: VolumeId,
    },
    /// Raised when a remote call fails.
    #[error(transparent)]
    Remote(#[from] RetryFailure),
    /// Raised when a remote field cannot be mapped.
    #[error("cannot map {field} value {value:?} for volume {volume_id}")]
    Mapping {
        /// Volume the field belongs to.
        volume_id: String,
        /// Wire field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Reads and normalizes volumes and mount points through a gateway.
#[derive(Debug)]
pub struct Observer<'a, G> {
    gateway: &'a G,
    retrier: &'a Retrier,
    page_size: u64,
}

impl<'a, G: Gateway> Observer<'a, G> {
    /// Creates an observer sharing the caller's gateway and retrier.
    #[must_use]
    pub const fn new(gateway: &'a G, retrier: &'a Retrier, page_size: u64) -> Self {
        Self {
            gateway,
            retrier,
            page_size: if page_size == 0 { 1 } else { page_size },
        }
    }

    /// Lists volumes, following pages until the reported total is reached or
    /// a short page is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError`] when a read fails or a volume cannot be mapped.
    pub async fn volumes(&self, filter: Option<&VolumeId>) -> Result<Vec<VolumeState>, ObserveError> {
        let mut collected = Vec::new();
        let mut offset = 0_u64;
        loop {
            let query = VolumeQuery {
                volume_id: filter.cloned(),
                offset,
                limit: self.page_size,
            };
            let page = self
                .retrier
                .run(Operation::ReadVolumes, || self.gateway.read_volumes(&query))
                .await?;
            let received = u64::try_from(page.volumes.len()).unwrap_or(u64::MAX);
            for raw in &page.volumes {
                collected.push(map_volume(raw)?);
            }
            offset = offset.saturating_add(received);
            tracing::trace!(offset, total = page.total_count, "read volume page");
            if received < self.page_size || offset >= page.total_count {
                break;
            }
        }
        Ok(collected)
    }

    /// Reads one volume.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError::NotFound`] when no matching volume is listed,
    /// or another [`ObserveError`] when the read fails.
    pub async fn volume(&self, volume_id: &VolumeId) -> Result<VolumeState, ObserveError> {
        let volumes = self.volumes(Some(volume_id)).await.map_err(|err| match err {
            ObserveError::Remote(failure) if failure.error.kind == ErrorKind::NotFound => {
                ObserveError::NotFound {
                    volume_id: volume_id.clone(),
                }
            }
            other => other,
        })?;
        volumes
            .into_iter()
            .find(|volume| &volume.volume_id == volume_id)
            .ok_or_else(|| ObserveError::NotFound {
                volume_id: volume_id.clone(),
            })
    }

    /// Reads the mount points of a volume.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError::NotFound`] when the control plane does not
    /// know the volume, or another [`ObserveError`] when the read fails.
    pub async fn mount_points(
        &self,
        volume_id: &VolumeId,
    ) -> Result<MountPointInventory, ObserveError> {
        let page = self
            .retrier
            .run(Operation::ReadMountPoints, || {
                self.gateway.read_mount_points(volume_id)
            })
            .await
            .map_err(|failure| {
                if failure.error.kind == ErrorKind::NotFound {
                    ObserveError::NotFound {
                        volume_id: volume_id.clone(),
                    }
                } else {
                    ObserveError::Remote(failure)
                }
            })?;
        let inventory = map_mount_points(volume_id, &page)?;
        if inventory.occupied() > usize::try_from(inventory.max_count).unwrap_or(usize::MAX) {
            tracing::warn!(
                %volume_id,
                current = inventory.current_count,
                maximum = inventory.max_count,
                "mount point count exceeds reported maximum"
            );
        }
        Ok(inventory)
    }

    /// Reads the volume and its mount points.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError`] when either read fails.
    pub async fn snapshot(&self, volume_id: &VolumeId) -> Result<Snapshot, ObserveError> {
        let volume = self.volume(volume_id).await?;
        let mount_points = self.mount_points(volume_id).await?;
        Ok(Snapshot {
            volume,
            mount_points,
        })
    }
}
