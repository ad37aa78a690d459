//! BDD step definitions for reconcile passes.

use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use ufs_reconciler::{MountPointKey, MountPointSpec, Operation, Step};

use super::test_helpers::{PassOutcome, ReconcileContext, volume_spec};
use crate::fixtures::reconciler;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

fn succeeded(reconcile_context: &ReconcileContext) -> Result<&ufs_reconciler::Report, StepError> {
    match reconcile_context.outcome.as_ref() {
        Some(PassOutcome::Success(report)) => Ok(report),
        Some(PassOutcome::Failure { message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[given("an empty control plane")]
fn empty_control_plane(reconcile_context: ReconcileContext) -> ReconcileContext {
    reconcile_context
}

#[given("an existing \"{protocol}\" \"{storage_class}\" volume of {size_gb:u64} GB")]
fn existing_volume(
    mut reconcile_context: ReconcileContext,
    protocol: String,
    storage_class: String,
    size_gb: u64,
) -> ReconcileContext {
    let spec = volume_spec(&protocol, &storage_class, size_gb).name("shared");
    reconcile_context.volume_id = Some(reconcile_context.gateway.seed_volume(&spec));
    reconcile_context
}

#[given("the volume has a mount point on \"{vpc}\" \"{subnet}\"")]
fn existing_mount_point(
    reconcile_context: ReconcileContext,
    vpc: String,
    subnet: String,
) -> ReconcileContext {
    let volume_id = reconcile_context.volume_id();
    reconcile_context.gateway.seed_mount_point(
        &volume_id,
        &MountPointSpec::new("existing", vpc.as_str(), subnet.as_str()),
    );
    reconcile_context
}

#[given("a desired \"{protocol}\" \"{storage_class}\" volume of {size_gb:u64} GB")]
fn desired_volume(
    mut reconcile_context: ReconcileContext,
    protocol: String,
    storage_class: String,
    size_gb: u64,
) -> ReconcileContext {
    reconcile_context.desired = Some(volume_spec(&protocol, &storage_class, size_gb).name("shared"));
    reconcile_context
}

#[given("a desired mount point \"{name}\" on \"{vpc}\" \"{subnet}\"")]
fn desired_mount_point(
    mut reconcile_context: ReconcileContext,
    name: String,
    vpc: String,
    subnet: String,
) -> ReconcileContext {
    reconcile_context
        .mount_points
        .push(MountPointSpec::new(name.as_str(), vpc.as_str(), subnet.as_str()));
    reconcile_context
}

#[when("I create the volume")]
fn create_volume(mut reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    let spec = reconcile_context.desired_volume();
    let reconciler = reconciler(&reconcile_context.gateway);
    let outcome = PassOutcome::from(runtime()?.block_on(reconciler.create(&spec)));
    if let PassOutcome::Success(report) = &outcome {
        reconcile_context.volume_id = Some(report.volume_id.clone());
    }
    reconcile_context.outcome = Some(outcome);
    Ok(reconcile_context)
}

#[when("I read the volume")]
fn read_volume(mut reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    let volume_id = reconcile_context.volume_id();
    let reconciler = reconciler(&reconcile_context.gateway);
    reconcile_context.outcome = Some(PassOutcome::from(
        runtime()?.block_on(reconciler.read(&volume_id)),
    ));
    Ok(reconcile_context)
}

#[when("I converge the volume")]
fn converge_volume(mut reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    let volume_id = reconcile_context.volume_id();
    let spec = reconcile_context.desired_volume();
    let mount_points = reconcile_context.mount_point_set();
    let reconciler = reconciler(&reconcile_context.gateway);
    reconcile_context.outcome = Some(PassOutcome::from(
        runtime()?.block_on(reconciler.converge(&volume_id, &spec, &mount_points)),
    ));
    Ok(reconcile_context)
}

#[when("I delete the volume")]
fn delete_volume(mut reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    let volume_id = reconcile_context.volume_id();
    let reconciler = reconciler(&reconcile_context.gateway);
    reconcile_context.outcome = Some(PassOutcome::from(
        runtime()?.block_on(reconciler.delete(&volume_id)),
    ));
    Ok(reconcile_context)
}

#[then("the pass succeeds")]
fn pass_succeeds(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    succeeded(reconcile_context).map(|_| ())
}

#[then("the pass fails with kind \"{kind}\"")]
fn pass_fails_with_kind(reconcile_context: &ReconcileContext, kind: String) -> Result<(), StepError> {
    match reconcile_context.outcome.as_ref() {
        Some(PassOutcome::Failure { kind: observed, .. }) if observed.as_str() == kind => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure of kind {kind}, got {other:?}"
        ))),
    }
}

#[then("the volume reports {size_gb:u64} GB of \"{storage_class}\" storage over \"{protocol}\"")]
fn volume_reports(
    reconcile_context: &ReconcileContext,
    size_gb: u64,
    storage_class: String,
    protocol: String,
) -> Result<(), StepError> {
    let report = succeeded(reconcile_context)?;
    let Some(snapshot) = report.snapshot.as_ref() else {
        return Err(StepError::Assertion(String::from("missing snapshot")));
    };
    let volume = &snapshot.volume;
    if volume.size_gb == size_gb
        && volume.storage_class.as_wire() == storage_class
        && volume.protocol.as_wire() == protocol
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {size_gb} GB {storage_class} over {protocol}, got {volume:?}"
        )))
    }
}

#[then("the volume has {count:usize} mount points")]
fn volume_has_mount_points(
    reconcile_context: &ReconcileContext,
    count: usize,
) -> Result<(), StepError> {
    let observed = reconcile_context
        .gateway
        .mount_point_keys(&reconcile_context.volume_id())
        .len();
    if observed == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} mount points, found {observed}"
        )))
    }
}

#[then("exactly {count:usize} extend call was made")]
fn extend_calls(reconcile_context: &ReconcileContext, count: usize) -> Result<(), StepError> {
    let observed = reconcile_context.gateway.count(Operation::ExtendVolume);
    if observed == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} extend calls, found {observed}"
        )))
    }
}

#[then("no mount point was added or removed")]
fn no_mount_point_mutation(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let gateway = &reconcile_context.gateway;
    let added = gateway.count(Operation::AddMountPoint);
    let removed = gateway.count(Operation::RemoveMountPoint);
    if added == 0 && removed == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no mount point calls, found {added} adds and {removed} removals"
        )))
    }
}

#[then("only the mount point on \"{vpc}\" \"{subnet}\" was added")]
fn only_mount_point_added(
    reconcile_context: &ReconcileContext,
    vpc: String,
    subnet: String,
) -> Result<(), StepError> {
    let report = succeeded(reconcile_context)?;
    let expected = MountPointKey::new(vpc.as_str(), subnet.as_str());
    match report.applied.as_slice() {
        [Step::AddMountPoint { spec }] if spec.key() == expected => Ok(()),
        applied => Err(StepError::Assertion(format!(
            "expected a single addition at {expected}, got {applied:?}"
        ))),
    }
}

#[then("no mutation was made")]
fn no_mutation(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let mutations = reconcile_context.gateway.mutations();
    if mutations.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no mutations, found {mutations:?}"
        )))
    }
}

#[then("the control plane holds no volumes")]
fn no_volumes(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let count = reconcile_context.gateway.volume_count();
    if count == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected no volumes, found {count}")))
    }
}
