//! Convergence of attributes and mount points on an existing volume.

use crate::diff::{Step, plan};
use crate::gateway::{
    ErrorKind, Gateway, MountPointRequest, Operation, UpdateVolumeInfoRequest,
};
use crate::model::{MountPointSet, VolumeId, VolumeSpec};

use super::{Failure, Pass, Phase, ReconcileError, Reconciler, Report};

impl<G: Gateway> Reconciler<G> {
    /// Moves an existing volume to the desired attributes and mount points.
    ///
    /// Steps run in plan order and the first failing step halts the pass.
    /// Calling again after a failure re-observes and resumes from wherever
    /// the control plane ended up.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] when the volume does not exist, the desired
    /// state is rejected, or a step fails. The failure lists the steps that
    /// completed, the step that failed and, when it can be read, the state
    /// left behind.
    #[tracing::instrument(skip_all, fields(volume_id = %volume_id))]
    pub async fn converge(
        &self,
        volume_id: &VolumeId,
        spec: &VolumeSpec,
        mount_points: &MountPointSet,
    ) -> Result<Report, Failure> {
        let mut pass = Pass::new(Phase::Active);
        pass.volume_id = Some(volume_id.clone());
        let observer = self.observer();

        let snapshot = match observer.snapshot(volume_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(self.fail(pass, err.into()).await),
        };
        if let Err(err) = pass.advance(Phase::Converging) {
            return Err(self.fail(pass, err).await);
        }

        let validated = spec
            .validate(&self.settings.size_rules)
            .and_then(|()| plan(spec, mount_points, &snapshot));
        let planned = match validated {
            Ok(planned) => planned,
            Err(err) => return Err(self.fail(pass, err.into()).await),
        };

        let converged = if planned.is_empty() {
            tracing::debug!("already converged");
            snapshot
        } else {
            for step in planned.steps() {
                tracing::info!(%step, "applying step");
                if let Err(err) = self.realize(volume_id, &step).await {
                    pass.failed_step = Some(step);
                    return Err(self.fail(pass, err).await);
                }
                pass.applied.push(step);
            }
            match observer.snapshot(volume_id).await {
                Ok(snapshot) => snapshot,
                Err(err) => return Err(self.fail(pass, err.into()).await),
            }
        };

        if let Err(err) = pass.advance(Phase::Active) {
            return Err(self.fail(pass, err).await);
        }
        Ok(Report {
            volume_id: volume_id.clone(),
            phase: pass.tracker.current(),
            snapshot: Some(converged),
            applied: pass.applied,
        })
    }

    /// Issues the gateway call for one plan step.
    ///
    /// Removing a mount point that is already gone and adding one that
    /// already exists both count as success, so a resumed pass does not trip
    /// over its own earlier work.
    async fn realize(&self, volume_id: &VolumeId, step: &Step) -> Result<(), ReconcileError> {
        let operation = step.operation();
        let outcome = match step {
            Step::UpdateInfo { name, remark } => {
                let request = UpdateVolumeInfoRequest {
                    volume_id: volume_id.clone(),
                    name: Some(name.clone()),
                    remark: Some(remark.clone()),
                };
                self.retrier
                    .run(operation, || self.gateway.update_volume_info(&request))
                    .await
            }
            Step::Extend { size_gb } => {
                self.retrier
                    .run(operation, || self.gateway.extend_volume(volume_id, *size_gb))
                    .await
            }
            Step::RemoveMountPoint { key } => {
                self.retrier
                    .run(operation, || self.gateway.remove_mount_point(volume_id, key))
                    .await
            }
            Step::AddMountPoint { spec } => {
                let request = MountPointRequest {
                    volume_id: volume_id.clone(),
                    key: spec.key(),
                    name: spec.name.clone(),
                };
                self.retrier
                    .run(operation, || self.gateway.add_mount_point(&request))
                    .await
            }
            // Lifecycle steps are issued by create and delete, never planned.
            Step::CreateVolume { .. } | Step::RemoveVolume => Ok(()),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(failure)
                if (operation == Operation::RemoveMountPoint
                    && failure.error.kind == ErrorKind::NotFound)
                    || (operation == Operation::AddMountPoint
                        && failure.error.kind == ErrorKind::Duplicate) =>
            {
                tracing::debug!(%operation, "step already in effect");
                Ok(())
            }
            Err(failure) => Err(failure.into()),
        }
    }
}
