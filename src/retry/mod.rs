//! Bounded exponential backoff around gateway calls.
//!
//! Whether an operation may be retried is decided by an explicit
//! [`RetryTable`] keyed by [`Operation`], not by the call site. Creation runs
//! once because a lost response cannot tell whether the volume was made;
//! every other operation is idempotent or safely re-checkable.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::gateway::{GatewayError, Operation};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
/// Upper bound on configured attempts; keeps the doubling delay from saturating.
pub const MAX_ATTEMPTS_CEILING: u32 = 16;

const DEFAULT_MODES: [(Operation, RetryMode); 8] = [
    (Operation::CreateVolume, RetryMode::Once),
    (Operation::ReadVolumes, RetryMode::Retry),
    (Operation::ExtendVolume, RetryMode::Retry),
    (Operation::UpdateVolumeInfo, RetryMode::Retry),
    (Operation::RemoveVolume, RetryMode::Retry),
    (Operation::ReadMountPoints, RetryMode::Retry),
    (Operation::AddMountPoint, RetryMode::Retry),
    (Operation::RemoveMountPoint, RetryMode::Retry),
];

/// Whether an operation may be re-issued after a retryable failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryMode {
    /// Retry retryable failures up to the policy ceiling.
    Retry,
    /// Issue the call exactly once.
    Once,
}

/// Retry mode per operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryTable {
    modes: BTreeMap<Operation, RetryMode>,
}

impl Default for RetryTable {
    fn default() -> Self {
        Self {
            modes: DEFAULT_MODES.into_iter().collect(),
        }
    }
}

impl RetryTable {
    /// Overrides the mode of one operation.
    #[must_use]
    pub fn with_mode(mut self, operation: Operation, mode: RetryMode) -> Self {
        self.modes.insert(operation, mode);
        self
    }

    /// Mode for `operation`. Operations missing from the table run once.
    #[must_use]
    pub fn mode(&self, operation: Operation) -> RetryMode {
        self.modes
            .get(&operation)
            .copied()
            .unwrap_or(RetryMode::Once)
    }
}

/// Attempt ceiling and backoff base.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to `1..=MAX_ATTEMPTS_CEILING`.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS_CEILING),
            base_delay,
        }
    }

    /// Total attempts allowed for a retried operation, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Terminal failure of a (possibly retried) call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct RetryFailure {
    /// Operation that failed.
    pub operation: Operation,
    /// Number of attempts made.
    pub attempts: u32,
    /// Last error returned by the gateway.
    #[source]
    pub error: GatewayError,
}

/// Runs gateway calls under a [`RetryPolicy`] and [`RetryTable`].
#[derive(Clone, Debug, Default)]
pub struct Retrier {
    policy: RetryPolicy,
    table: RetryTable,
}

impl Retrier {
    /// Creates a retrier.
    #[must_use]
    pub const fn new(policy: RetryPolicy, table: RetryTable) -> Self {
        Self { policy, table }
    }

    /// Returns the policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the table in use.
    #[must_use]
    pub const fn table(&self) -> &RetryTable {
        &self.table
    }

    /// Invokes `call` until it succeeds, fails fatally, or the ceiling is hit.
    ///
    /// # Errors
    ///
    /// Returns [`RetryFailure`] carrying the last [`GatewayError`] and the
    /// number of attempts made.
    pub async fn run<T, F, Fut>(&self, operation: Operation, mut call: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let ceiling = match self.table.mode(operation) {
            RetryMode::Retry => self.policy.max_attempts,
            RetryMode::Once => 1,
        };

        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < ceiling => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        %operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        kind = %error.kind,
                        "retrying after transient failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::debug!(%operation, attempt, kind = %error.kind, "giving up");
                    return Err(RetryFailure {
                        operation,
                        attempts: attempt,
                        error,
                    });
                }
            }
        }
    }
}
