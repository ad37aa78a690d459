//! Volume teardown.

use crate::diff::Step;
use crate::gateway::{Gateway, Operation};
use crate::model::VolumeId;
use crate::observe::ObserveError;

use super::{Failure, Pass, Phase, ReconcileError, Reconciler, Report};

impl<G: Gateway> Reconciler<G> {
    /// Removes every mount point and then the volume.
    ///
    /// Missing mount points and a missing volume count as already deleted, so
    /// the call can be repeated safely.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] when a removal fails for any reason other than
    /// the target being gone.
    #[tracing::instrument(skip_all, fields(volume_id = %volume_id))]
    pub async fn delete(&self, volume_id: &VolumeId) -> Result<Report, Failure> {
        let mut pass = Pass::new(Phase::Active);
        pass.volume_id = Some(volume_id.clone());
        if let Err(err) = pass.advance(Phase::Deleting) {
            return Err(self.fail(pass, err).await);
        }

        let entries = match self.observer().mount_points(volume_id).await {
            Ok(inventory) => inventory.entries,
            Err(ObserveError::NotFound { .. }) => {
                tracing::info!("volume already absent");
                Vec::new()
            }
            Err(err) => return Err(self.fail(pass, err.into()).await),
        };

        for entry in entries {
            let removed = self
                .retrier
                .run(Operation::RemoveMountPoint, || {
                    self.gateway.remove_mount_point(volume_id, &entry.key)
                })
                .await;
            match removed {
                Ok(()) => pass.applied.push(Step::RemoveMountPoint { key: entry.key }),
                Err(failure) if failure.error.is_not_found() => {
                    tracing::debug!(key = %entry.key, "mount point already absent");
                }
                Err(failure) => {
                    return Err(self.fail(pass, ReconcileError::from(failure)).await);
                }
            }
        }

        let removed = self
            .retrier
            .run(Operation::RemoveVolume, || {
                self.gateway.remove_volume(volume_id)
            })
            .await;
        match removed {
            Ok(()) => {
                tracing::info!("volume removed");
                pass.applied.push(Step::RemoveVolume);
            }
            Err(failure) if failure.error.is_not_found() => {
                tracing::debug!("volume already absent");
            }
            Err(failure) => return Err(self.fail(pass, failure.into()).await),
        }

        if let Err(err) = pass.advance(Phase::Absent) {
            return Err(self.fail(pass, err).await);
        }
        Ok(Report {
            volume_id: volume_id.clone(),
            phase: pass.tracker.current(),
            snapshot: None,
            applied: pass.applied,
        })
    }
}
