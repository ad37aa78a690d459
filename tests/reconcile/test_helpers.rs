//! Shared fixtures and helpers for reconcile BDD scenarios.

use rstest::fixture;
use ufs_reconciler::model::{ProtocolType, StorageClass};
use ufs_reconciler::test_support::FakeGateway;
use ufs_reconciler::{
    Failure, FailureKind, MountPointSet, MountPointSpec, Report, VolumeId, VolumeSpec,
};

#[derive(Clone, Debug)]
pub enum PassOutcome {
    Success(Report),
    Failure { kind: FailureKind, message: String },
}

impl From<Result<Report, Failure>> for PassOutcome {
    fn from(result: Result<Report, Failure>) -> Self {
        match result {
            Ok(report) => Self::Success(report),
            Err(failure) => Self::Failure {
                kind: failure.kind(),
                message: failure.to_string(),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReconcileContext {
    pub gateway: FakeGateway,
    pub volume_id: Option<VolumeId>,
    pub desired: Option<VolumeSpec>,
    pub mount_points: Vec<MountPointSpec>,
    pub outcome: Option<PassOutcome>,
}

impl ReconcileContext {
    pub fn desired_volume(&self) -> VolumeSpec {
        self.desired
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a desired volume"))
    }

    pub fn volume_id(&self) -> VolumeId {
        self.volume_id
            .clone()
            .unwrap_or_else(|| panic!("test setup requires an existing volume"))
    }

    pub fn mount_point_set(&self) -> MountPointSet {
        MountPointSet::from_specs(self.mount_points.iter().cloned())
            .unwrap_or_else(|err| panic!("desired mount points should be valid: {err}"))
    }
}

#[fixture]
pub fn reconcile_context() -> ReconcileContext {
    ReconcileContext {
        gateway: FakeGateway::new(),
        volume_id: None,
        desired: None,
        mount_points: Vec::new(),
        outcome: None,
    }
}

pub fn volume_spec(protocol_token: &str, class_token: &str, size_gb: u64) -> VolumeSpec {
    let protocol = ProtocolType::from_wire(protocol_token)
        .unwrap_or_else(|| panic!("unknown protocol token: {protocol_token}"));
    let storage_class = StorageClass::from_wire(class_token)
        .unwrap_or_else(|| panic!("unknown storage class token: {class_token}"));
    VolumeSpec::new(protocol, storage_class, size_gb)
}
