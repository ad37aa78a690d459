//! Volume creation and the readiness poll.

use tokio::time::{Instant, sleep};
use uuid::Uuid;

use crate::diff::Step;
use crate::gateway::{CreateVolumeRequest, Gateway, Operation};
use crate::model::{VolumeId, VolumeSpec, VolumeState};
use crate::observe::ObserveError;
use crate::retry::RetryFailure;

use super::{
    Failure, Pass, Phase, ReconcileError, Reconciler, Report, deadline_after, is_ready_status,
};

const DEFAULT_NAME_PREFIX: &str = "ufs-";

fn default_name() -> String {
    format!("{DEFAULT_NAME_PREFIX}{}", Uuid::new_v4().simple())
}

impl<G: Gateway> Reconciler<G> {
    /// Creates a volume and waits until it is ready.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] when validation, creation or the readiness poll
    /// fails.
    pub async fn create(&self, spec: &VolumeSpec) -> Result<Report, Failure> {
        self.create_until(spec, None).await
    }

    /// Creates a volume and waits until it is ready or `deadline` passes,
    /// whichever comes first. The configured poll timeout still applies.
    ///
    /// `CreateVolume` is issued exactly once. When it fails with a retryable
    /// error, a volume is adopted only if it was not listed before the request,
    /// is the only one of its kind and matches the requested name, protocol,
    /// storage class and size. Otherwise the error is surfaced.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] when validation or creation fails, or when the
    /// poll ends before the volume is ready. A poll timeout reports phase
    /// `Creating` and the last observed status.
    #[tracing::instrument(skip_all, fields(name = spec.name.as_deref()))]
    pub async fn create_until(
        &self,
        spec: &VolumeSpec,
        deadline: Option<Instant>,
    ) -> Result<Report, Failure> {
        let mut pass = Pass::new(Phase::Absent);
        if let Err(err) = spec.validate(&self.settings.size_rules) {
            return Err(self.fail(pass, err.into()).await);
        }
        if let Err(err) = pass.advance(Phase::Creating) {
            return Err(self.fail(pass, err).await);
        }

        let name = spec.name.clone().unwrap_or_else(default_name);
        let request = CreateVolumeRequest {
            name: name.clone(),
            protocol: spec.protocol,
            storage_class: spec.storage_class,
            size_gb: spec.size_gb,
            charge_mode: spec.charge_mode,
            remark: spec.remark.clone(),
            tag: spec.tag.clone(),
            quantity: spec.quantity,
        };

        let preexisting = self.ids_named(&name).await;
        let volume_id = match self.issue_create(&request, preexisting.as_deref()).await {
            Ok(volume_id) => volume_id,
            Err(err) => return Err(self.fail(pass, err).await),
        };
        tracing::info!(%volume_id, %name, "volume requested");
        pass.volume_id = Some(volume_id.clone());
        pass.applied.push(Step::CreateVolume { name });

        if let Err(err) = self.wait_until_ready(&volume_id, deadline).await {
            return Err(self.fail(pass, err).await);
        }
        if let Err(err) = pass.advance(Phase::Active) {
            return Err(self.fail(pass, err).await);
        }

        match self.observer().snapshot(&volume_id).await {
            Ok(snapshot) => Ok(Report {
                volume_id,
                phase: pass.tracker.current(),
                snapshot: Some(snapshot),
                applied: pass.applied,
            }),
            Err(err) => Err(self.fail(pass, err.into()).await),
        }
    }

    /// Ids of listed volumes already carrying `name`, or `None` when the
    /// listing fails.
    async fn ids_named(&self, name: &str) -> Option<Vec<VolumeId>> {
        match self.observer().volumes(None).await {
            Ok(volumes) => Some(
                volumes
                    .into_iter()
                    .filter(|volume| volume.name == name)
                    .map(|volume| volume.volume_id)
                    .collect(),
            ),
            Err(err) => {
                tracing::warn!(%name, error = %err, "listing before create failed; orphan recovery disabled");
                None
            }
        }
    }

    async fn issue_create(
        &self,
        request: &CreateVolumeRequest,
        preexisting: Option<&[VolumeId]>,
    ) -> Result<VolumeId, ReconcileError> {
        let outcome = self
            .retrier
            .run(Operation::CreateVolume, || {
                self.gateway.create_volume(request)
            })
            .await;
        match outcome {
            Ok(created) if created.volume_id.trim().is_empty() => Err(ReconcileError::Mapping {
                volume_id: String::new(),
                field: "VolumeId",
                value: created.volume_id,
            }),
            Ok(created) => Ok(VolumeId::new(created.volume_id)),
            Err(failure) if failure.error.is_retryable() => match preexisting {
                Some(preexisting) => self.recover_orphan(request, preexisting, failure).await,
                None => Err(failure.into()),
            },
            Err(failure) => Err(failure.into()),
        }
    }

    /// Looks for a volume created by a request whose response was lost.
    ///
    /// Volumes listed before the request was issued never qualify.
    async fn recover_orphan(
        &self,
        request: &CreateVolumeRequest,
        preexisting: &[VolumeId],
        failure: RetryFailure,
    ) -> Result<VolumeId, ReconcileError> {
        let name = request.name.as_str();
        tracing::warn!(%name, error = %failure, "create outcome unknown; looking for the volume by name");
        let volumes = match self.observer().volumes(None).await {
            Ok(volumes) => volumes,
            Err(err) => {
                tracing::warn!(%name, error = %err, "listing for orphan recovery failed");
                return Err(failure.into());
            }
        };
        let mut candidates = volumes.into_iter().filter(|volume| {
            volume.name == name
                && !preexisting.contains(&volume.volume_id)
                && volume.protocol == request.protocol
                && volume.storage_class == request.storage_class
                && volume.size_gb == request.size_gb
        });
        match (candidates.next(), candidates.next()) {
            (Some(volume), None) => {
                tracing::info!(volume_id = %volume.volume_id, %name, "adopted volume created by lost request");
                Ok(volume.volume_id)
            }
            (Some(_), Some(_)) => {
                tracing::warn!(%name, "several new volumes match the request; not adopting");
                Err(failure.into())
            }
            _ => Err(failure.into()),
        }
    }

    /// Polls until the volume is listed with a ready status.
    async fn wait_until_ready(
        &self,
        volume_id: &VolumeId,
        deadline: Option<Instant>,
    ) -> Result<VolumeState, ReconcileError> {
        let started = Instant::now();
        let budget_end = deadline_after(started, self.settings.poll_timeout);
        let limit = deadline.map_or(budget_end, |deadline| deadline.min(budget_end));
        let observer = self.observer();
        let mut last_status = None;

        loop {
            match observer.volume(volume_id).await {
                Ok(state) if is_ready_status(state.status.as_deref()) => {
                    tracing::info!(%volume_id, "volume ready");
                    return Ok(state);
                }
                Ok(state) => {
                    tracing::debug!(%volume_id, status = state.status.as_deref(), "volume not ready");
                    last_status = state.status;
                }
                // Newly created volumes may not be listed yet.
                Err(ObserveError::NotFound { .. }) => {
                    tracing::debug!(%volume_id, "volume not listed yet");
                }
                Err(err) => return Err(err.into()),
            }

            let now = Instant::now();
            if now >= limit {
                return Err(ReconcileError::PollTimeout {
                    volume_id: volume_id.clone(),
                    last_status,
                    waited: now.duration_since(started),
                });
            }
            sleep(self.settings.poll_interval.min(limit - now)).await;
        }
    }
}
