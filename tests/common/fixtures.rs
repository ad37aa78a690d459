//! Reconciler fixtures shared by integration and behaviour tests.

use std::time::Duration;

use ufs_reconciler::test_support::FakeGateway;
use ufs_reconciler::{Reconciler, ReconcilerSettings, Retrier};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a reconciler over a clone of `gateway` with short poll settings.
pub fn reconciler(gateway: &FakeGateway) -> Reconciler<FakeGateway> {
    Reconciler::new(
        gateway.clone(),
        Retrier::default(),
        ReconcilerSettings::default()
            .with_poll_interval(POLL_INTERVAL)
            .with_poll_timeout(POLL_TIMEOUT),
    )
}
