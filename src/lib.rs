//! Core library for the managed network file storage reconciler.
//!
//! The crate drives one volume and its mount points from a desired state to
//! the state held by a cloud control plane. Remote calls go through the
//! [`gateway::Gateway`] trait and the [`retry`] engine; [`observe`] normalizes
//! what the control plane reports, [`diff`] plans the changes, and
//! [`reconcile`] runs the create, converge and delete lifecycle.

pub mod config;
pub mod desired;
pub mod diff;
pub mod gateway;
pub mod model;
pub mod observe;
pub mod reconcile;
pub mod retry;
pub mod test_support;

pub use config::ReconcilerConfig;
pub use desired::DesiredState;
pub use diff::{Plan, Step};
pub use gateway::{ErrorKind, Gateway, GatewayContext, GatewayError, Operation};
pub use model::{
    MountPointKey, MountPointSet, MountPointSpec, Snapshot, ValidationError, VolumeId, VolumeSpec,
};
pub use reconcile::{Failure, FailureKind, Phase, Reconciler, ReconcilerSettings, Report};
pub use retry::{Retrier, RetryPolicy, RetryTable};
