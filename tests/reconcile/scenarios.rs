//! BDD scenarios for reconcile passes.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ReconcileContext, reconcile_context};

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Create a volume and read it back"
)]
fn scenario_create_and_read(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Grow a volume without touching mount points"
)]
fn scenario_grow_volume(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Attach a mount point on a new subnet"
)]
fn scenario_attach_mount_point(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Reject shrinking a volume"
)]
fn scenario_reject_shrink(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Deleting twice succeeds both times"
)]
fn scenario_delete_twice(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}
