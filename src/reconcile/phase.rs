//! Lifecycle phases and the transitions allowed between them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle phase of a managed volume.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The volume does not exist.
    Absent,
    /// The volume was requested and is not ready yet.
    Creating,
    /// The volume is ready and no pass is running.
    Active,
    /// Attributes or mount points are being changed.
    Converging,
    /// Mount points and the volume are being removed.
    Deleting,
    /// A pass stopped on an error.
    Failed,
}

impl Phase {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Converging => "converging",
            Self::Deleting => "deleting",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` while a mutation is running.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Creating | Self::Converging | Self::Deleting)
    }

    /// Returns `true` when `next` may follow `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Absent, Self::Creating)
            | (Self::Creating | Self::Converging, Self::Active)
            | (Self::Active | Self::Failed, Self::Converging | Self::Deleting)
            | (Self::Deleting, Self::Absent) => true,
            (from, Self::Failed) => from.is_in_flight(),
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a transition is not allowed.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("cannot move from {from} to {to}")]
pub struct PhaseError {
    /// Phase before the attempted transition.
    pub from: Phase,
    /// Requested phase.
    pub to: Phase,
}

/// Tracks the phase of one pass and rejects invalid transitions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    /// Starts tracking at `phase`.
    #[must_use]
    pub const fn new(phase: Phase) -> Self {
        Self { current: phase }
    }

    /// Current phase.
    #[must_use]
    pub const fn current(&self) -> Phase {
        self.current
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError`] when `next` may not follow the current phase.
    pub fn advance(&mut self, next: Phase) -> Result<(), PhaseError> {
        if !self.current.can_transition_to(next) {
            return Err(PhaseError {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!(from = %self.current, to = %next, "phase transition");
        self.current = next;
        Ok(())
    }
}
