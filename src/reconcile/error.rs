//! Errors and failure reports surfaced by the reconciler.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::diff::Step;
use crate::gateway::{ErrorKind, Operation};
use crate::model::{Snapshot, ValidationError, VolumeId};
use crate::observe::ObserveError;
use crate::retry::RetryFailure;

use super::phase::{Phase, PhaseError};

/// Caller-facing classification of a [`ReconcileError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FailureKind {
    /// Retryable remote failure that exhausted its attempts.
    Transient,
    /// The volume or mount point does not exist.
    NotFound,
    /// The desired state was rejected before or by the control plane.
    Validation,
    /// The account or volume ran out of capacity.
    Quota,
    /// Credentials were rejected.
    Authorization,
    /// The volume did not become ready in time.
    PollTimeout,
    /// The control plane or the lifecycle disagreed with the request order.
    Conflict,
    /// The control plane returned something that could not be understood.
    Protocol,
}

impl FailureKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Quota => "quota",
            Self::Authorization => "authorization",
            Self::PollTimeout => "poll_timeout",
            Self::Conflict => "conflict",
            Self::Protocol => "protocol",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a reconcile pass.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReconcileError {
    /// Raised when desired state is rejected locally.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Raised when a remote call fails.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Remote {
        /// Operation that failed.
        operation: Operation,
        /// Attempts made.
        attempts: u32,
        /// Last gateway error.
        #[source]
        source: crate::gateway::GatewayError,
    },
    /// Raised when the volume does not exist.
    #[error("volume {volume_id} not found")]
    NotFound {
        /// Identifier that was looked up.
        volume_id: VolumeId,
    },
    /// Raised when a new volume does not become ready in time.
    #[error(
        "volume {volume_id} not ready after {}s (last status: {})",
        waited.as_secs(),
        last_status.as_deref().unwrap_or("unknown")
    )]
    PollTimeout {
        /// Volume being polled.
        volume_id: VolumeId,
        /// Last status observed, if any.
        last_status: Option<String>,
        /// Time spent polling.
        waited: Duration,
    },
    /// Raised when an observed field cannot be mapped.
    #[error("cannot map {field} value {value:?} for volume {volume_id}")]
    Mapping {
        /// Volume the field belongs to.
        volume_id: String,
        /// Wire field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },
    /// Raised when the lifecycle would move through an invalid transition.
    #[error(transparent)]
    Phase(#[from] PhaseError),
}

impl ReconcileError {
    /// Classifies the error for callers.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::Remote { source, .. } => match source.kind {
                ErrorKind::Timeout | ErrorKind::Throttled | ErrorKind::Internal => {
                    FailureKind::Transient
                }
                ErrorKind::NotFound => FailureKind::NotFound,
                ErrorKind::Duplicate => FailureKind::Conflict,
                ErrorKind::Validation => FailureKind::Validation,
                ErrorKind::Quota => FailureKind::Quota,
                ErrorKind::Authorization => FailureKind::Authorization,
                ErrorKind::Protocol => FailureKind::Protocol,
            },
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::PollTimeout { .. } => FailureKind::PollTimeout,
            Self::Mapping { .. } => FailureKind::Protocol,
            Self::Phase(_) => FailureKind::Conflict,
        }
    }
}

impl From<RetryFailure> for ReconcileError {
    fn from(failure: RetryFailure) -> Self {
        Self::Remote {
            operation: failure.operation,
            attempts: failure.attempts,
            source: failure.error,
        }
    }
}

impl From<ObserveError> for ReconcileError {
    fn from(err: ObserveError) -> Self {
        match err {
            ObserveError::NotFound { volume_id } => Self::NotFound { volume_id },
            ObserveError::Remote(failure) => failure.into(),
            ObserveError::Mapping {
                volume_id,
                field,
                value,
            } => Self::Mapping {
                volume_id,
                field,
                value,
            },
        }
    }
}

/// Failed pass, with whatever progress was made before the error.
///
/// The error, the failing step and the snapshot are boxed so the failure
/// stays small on the `Err` path.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{failed_in} pass failed: {error}")]
pub struct Failure {
    /// Error that stopped the pass.
    #[source]
    pub error: Box<ReconcileError>,
    /// Phase reported to the caller.
    pub phase: Phase,
    /// Phase the pass was in when the error occurred.
    pub failed_in: Phase,
    /// Volume the pass worked on, once known.
    pub volume_id: Option<VolumeId>,
    /// Steps that completed before the error.
    pub applied: Vec<Step>,
    /// Step whose remote call failed, when the pass was applying a plan.
    pub failed_step: Option<Box<Step>>,
    /// Best-effort snapshot read after the error.
    pub snapshot: Option<Box<Snapshot>>,
}

impl Failure {
    /// Classifies the underlying error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}
