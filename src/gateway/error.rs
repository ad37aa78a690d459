//! Classified errors returned by gateway implementations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Operation;

/// Classification of a gateway failure, decided once at the call site.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request did not complete in time or the connection failed.
    Timeout,
    /// The control plane rejected the request because of rate limiting.
    Throttled,
    /// The control plane reported a transient internal failure.
    Internal,
    /// The referenced resource does not exist.
    NotFound,
    /// The resource being created already exists.
    Duplicate,
    /// The request carried invalid parameters.
    Validation,
    /// The account quota does not allow the request.
    Quota,
    /// The caller is not allowed to perform the request.
    Authorization,
    /// The response could not be understood.
    Protocol,
}

impl ErrorKind {
    /// Returns `true` for kinds that may succeed when retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Throttled | Self::Internal)
    }

    /// Short lowercase label used in messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Throttled => "throttled",
            Self::Internal => "internal",
            Self::NotFound => "not found",
            Self::Duplicate => "duplicate",
            Self::Validation => "validation",
            Self::Quota => "quota exceeded",
            Self::Authorization => "unauthorized",
            Self::Protocol => "protocol",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a [`Gateway`](super::Gateway) call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{operation} failed ({kind}): {message}")]
pub struct GatewayError {
    /// Operation that failed.
    pub operation: Operation,
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Message returned by the control plane or transport.
    pub message: String,
}

impl GatewayError {
    /// Builds a classified error.
    #[must_use]
    pub fn new(operation: Operation, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Returns `true` when the failure may succeed on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns `true` when the referenced resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}
