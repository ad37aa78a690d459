//! Drives a volume and its mount points through their lifecycle.
//!
//! Each public method runs one pass for one volume: it observes remote state,
//! plans, issues mutations through the [`Retrier`], and returns either a
//! [`Report`] or a [`Failure`] describing how far it got. Nothing is cached
//! between passes; repeated passes re-observe and resume.

mod converge;
mod create;
mod delete;
mod error;
mod phase;

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::diff::Step;
use crate::gateway::Gateway;
use crate::model::{MountPointSet, Snapshot, SizeRules, VolumeId, VolumeSpec};
use crate::observe::{DEFAULT_PAGE_SIZE, Observer};
use crate::retry::Retrier;

pub use error::{Failure, FailureKind, ReconcileError};
pub use phase::{Phase, PhaseError, PhaseTracker};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);
/// Bound used when a requested wait does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns `start + wait`, clamped to roughly thirty years out when the sum
/// overflows the clock.
#[must_use]
pub fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Status tokens that mark a volume as ready. Compared case-insensitively.
const READY_STATUSES: [&str; 2] = ["available", "normal"];

/// Returns `true` when a reported status means the volume can be used. A
/// volume that reports no status is treated as ready once it is listed.
#[must_use]
pub fn is_ready_status(status: Option<&str>) -> bool {
    status.is_none_or(|token| {
        READY_STATUSES
            .iter()
            .any(|ready| token.trim().eq_ignore_ascii_case(ready))
    })
}

/// Tunables for polling, paging and size validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReconcilerSettings {
    /// Delay between readiness polls.
    pub poll_interval: Duration,
    /// Upper bound on the readiness poll.
    pub poll_timeout: Duration,
    /// Volumes requested per listing page.
    pub page_size: u64,
    /// Size rules per storage class.
    pub size_rules: SizeRules,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            size_rules: SizeRules::default(),
        }
    }
}

impl ReconcilerSettings {
    /// Overrides the readiness poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the readiness poll timeout.
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Overrides the listing page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Overrides the size rules.
    #[must_use]
    pub const fn with_size_rules(mut self, rules: SizeRules) -> Self {
        self.size_rules = rules;
        self
    }
}

/// Successful pass.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Report {
    /// Volume the pass worked on.
    pub volume_id: VolumeId,
    /// Phase after the pass.
    pub phase: Phase,
    /// Observed state at the end of the pass. Absent after deletion.
    pub snapshot: Option<Snapshot>,
    /// Steps issued by the pass, in order.
    pub applied: Vec<Step>,
}

/// Per-pass bookkeeping shared by the lifecycle operations.
struct Pass {
    tracker: PhaseTracker,
    volume_id: Option<VolumeId>,
    applied: Vec<Step>,
    failed_step: Option<Step>,
}

impl Pass {
    const fn new(start: Phase) -> Self {
        Self {
            tracker: PhaseTracker::new(start),
            volume_id: None,
            applied: Vec::new(),
            failed_step: None,
        }
    }

    fn advance(&mut self, next: Phase) -> Result<(), ReconcileError> {
        self.tracker.advance(next).map_err(ReconcileError::from)
    }
}

/// Reconciles volumes through a [`Gateway`].
#[derive(Debug)]
pub struct Reconciler<G> {
    gateway: G,
    retrier: Retrier,
    settings: ReconcilerSettings,
}

impl<G: Gateway> Reconciler<G> {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(gateway: G, retrier: Retrier, settings: ReconcilerSettings) -> Self {
        Self {
            gateway,
            retrier,
            settings,
        }
    }

    /// Gateway in use.
    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    fn observer(&self) -> Observer<'_, G> {
        Observer::new(&self.gateway, &self.retrier, self.settings.page_size)
    }

    /// Reads the normalized volume and its mount points.
    ///
    /// The reported phase is `Active` when the volume is ready and
    /// `Creating` otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] in phase `Absent` when the volume does not
    /// exist, or in phase `Failed` when the read fails.
    #[tracing::instrument(skip_all, fields(volume_id = %volume_id))]
    pub async fn read(&self, volume_id: &VolumeId) -> Result<Report, Failure> {
        match self.observer().snapshot(volume_id).await {
            Ok(snapshot) => {
                let phase = if is_ready_status(snapshot.volume.status.as_deref()) {
                    Phase::Active
                } else {
                    Phase::Creating
                };
                Ok(Report {
                    volume_id: volume_id.clone(),
                    phase,
                    snapshot: Some(snapshot),
                    applied: Vec::new(),
                })
            }
            Err(err) => {
                let error = ReconcileError::from(err);
                let phase = if error.kind() == FailureKind::NotFound {
                    Phase::Absent
                } else {
                    Phase::Failed
                };
                Err(Failure {
                    error: Box::new(error),
                    phase,
                    failed_in: Phase::Active,
                    volume_id: Some(volume_id.clone()),
                    applied: Vec::new(),
                    failed_step: None,
                    snapshot: None,
                })
            }
        }
    }

    /// Creates the volume when `volume_id` is absent, then converges the
    /// full desired state. With an identifier, converges only.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] from whichever pass failed. Steps applied by the
    /// create pass are included when the follow-up converge fails.
    pub async fn apply(
        &self,
        volume_id: Option<&VolumeId>,
        spec: &VolumeSpec,
        mount_points: &MountPointSet,
    ) -> Result<Report, Failure> {
        if let Some(volume_id) = volume_id {
            return self.converge(volume_id, spec, mount_points).await;
        }
        let created = self.create(spec).await?;
        match self.converge(&created.volume_id, spec, mount_points).await {
            Ok(mut report) => {
                report.applied.splice(0..0, created.applied);
                Ok(report)
            }
            Err(mut failure) => {
                failure.applied.splice(0..0, created.applied);
                Err(failure)
            }
        }
    }

    /// Turns a pass into a [`Failure`], attaching a best-effort snapshot when
    /// the volume is known.
    async fn fail(&self, mut pass: Pass, error: ReconcileError) -> Failure {
        let failed_in = pass.tracker.current();
        let phase = if matches!(error, ReconcileError::PollTimeout { .. }) {
            Phase::Creating
        } else {
            if pass.tracker.current().is_in_flight() {
                // Failed is reachable from every in-flight phase.
                pass.tracker.advance(Phase::Failed).ok();
            }
            Phase::Failed
        };
        let snapshot = match (&pass.volume_id, error.kind()) {
            (Some(volume_id), kind) if kind != FailureKind::NotFound => {
                self.observer().snapshot(volume_id).await.ok().map(Box::new)
            }
            _ => None,
        };
        tracing::warn!(
            volume_id = pass.volume_id.as_ref().map(VolumeId::as_str),
            %failed_in,
            kind = %error.kind(),
            applied = pass.applied.len(),
            failed_step = pass.failed_step.as_ref().map(ToString::to_string),
            "reconcile pass failed: {error}"
        );
        Failure {
            error: Box::new(error),
            phase,
            failed_in,
            volume_id: pass.volume_id,
            applied: pass.applied,
            failed_step: pass.failed_step.map(Box::new),
            snapshot,
        }
    }
}
