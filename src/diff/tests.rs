//! Unit tests for the state differ.

use rstest::{fixture, rstest};

use super::*;
use crate::model::{MountPointState, ProtocolType, StorageClass, VolumeId};

#[fixture]
fn observed() -> VolumeState {
    VolumeState {
        volume_id: VolumeId::new("vol-1"),
        name: String::from("shared"),
        remark: String::from("team data"),
        size_gb: 500,
        used_size_gb: 0,
        storage_class: StorageClass::Basic,
        protocol: ProtocolType::NfsV4,
        expires_at: None,
        expired: false,
        max_mount_points: 3,
        mount_point_count: 0,
        tag: None,
        created_at: None,
        status: Some(String::from("Available")),
    }
}

fn spec(size_gb: u64) -> VolumeSpec {
    VolumeSpec::new(ProtocolType::NfsV4, StorageClass::Basic, size_gb)
        .name("shared")
        .remark("team data")
}

fn inventory(entries: &[(&str, &str, &str)], max_count: u32) -> MountPointInventory {
    let volume_id = VolumeId::new("vol-1");
    let entries: Vec<MountPointState> = entries
        .iter()
        .map(|(name, vpc, subnet)| MountPointState {
            volume_id: volume_id.clone(),
            name: (*name).to_owned(),
            key: MountPointKey::new(*vpc, *subnet),
            address: None,
            created_at: None,
        })
        .collect();
    MountPointInventory {
        volume_id,
        current_count: u32::try_from(entries.len()).expect("small"),
        entries,
        max_count,
    }
}

fn desired(entries: &[(&str, &str, &str)]) -> MountPointSet {
    MountPointSet::from_specs(
        entries
            .iter()
            .map(|(name, vpc, subnet)| MountPointSpec::new(*name, *vpc, *subnet)),
    )
    .expect("valid set")
}

#[rstest]
fn matching_volume_produces_no_changes(observed: VolumeState) {
    let diff = diff_volume(&spec(500), &observed).expect("diff");
    assert!(diff.is_empty());
}

#[rstest]
fn unset_name_and_remark_keep_observed_values(observed: VolumeState) {
    let bare = VolumeSpec::new(ProtocolType::NfsV4, StorageClass::Basic, 500);
    assert!(diff_volume(&bare, &observed).expect("diff").is_empty());
}

#[rstest]
fn growth_emits_one_extend_with_absolute_size(observed: VolumeState) {
    let diff = diff_volume(&spec(800), &observed).expect("diff");
    assert_eq!(diff.extend_to, Some(800));
    assert_eq!(diff.info, None);
}

#[rstest]
fn shrink_is_rejected(observed: VolumeState) {
    let err = diff_volume(&spec(400), &observed).expect_err("shrink");
    assert_eq!(
        err,
        ValidationError::Shrink {
            volume_id: VolumeId::new("vol-1"),
            observed_gb: 500,
            desired_gb: 400,
        }
    );
}

#[rstest]
fn immutable_fields_are_checked_before_shrink(observed: VolumeState) {
    let changed = VolumeSpec::new(ProtocolType::NfsV3, StorageClass::Basic, 100);
    let err = diff_volume(&changed, &observed).expect_err("immutable");
    assert!(matches!(
        err,
        ValidationError::ImmutableField {
            field: "protocol",
            ..
        }
    ));

    let changed = VolumeSpec::new(ProtocolType::NfsV4, StorageClass::Advanced, 500);
    let err = diff_volume(&changed, &observed).expect_err("immutable");
    assert!(matches!(
        err,
        ValidationError::ImmutableField {
            field: "storage_class",
            ..
        }
    ));
}

#[rstest]
fn name_change_emits_single_update_with_both_targets(observed: VolumeState) {
    let renamed = spec(500).name("renamed");
    let diff = diff_volume(&renamed, &observed).expect("diff");
    assert_eq!(
        diff.info,
        Some((String::from("renamed"), String::from("team data")))
    );
    assert_eq!(diff.extend_to, None);
}

#[rstest]
fn mount_point_sets_are_diffed_by_key() {
    let desired = desired(&[("a", "vpc-1", "s-1"), ("b", "vpc-1", "s-2")]);
    let observed = inventory(&[("b", "vpc-1", "s-2"), ("c", "vpc-2", "s-9")], 5);

    let plan = diff_mount_points(&desired, &observed);

    assert_eq!(plan.to_remove, vec![MountPointKey::new("vpc-2", "s-9")]);
    assert_eq!(plan.to_add, vec![MountPointSpec::new("a", "vpc-1", "s-1")]);
}

#[rstest]
fn observed_and_desired_on_same_key_never_conflict() {
    let desired = desired(&[("a", "vpc-a", "sub-a"), ("b", "vpc-b", "sub-b")]);
    let observed = inventory(&[("a", "vpc-a", "sub-a")], 5);

    let plan = diff_mount_points(&desired, &observed);

    assert!(plan.to_remove.is_empty());
    assert_eq!(plan.to_add, vec![MountPointSpec::new("b", "vpc-b", "sub-b")]);
}

#[rstest]
fn name_mismatch_on_existing_key_is_left_alone() {
    let desired = desired(&[("new-name", "vpc-1", "s-1")]);
    let observed = inventory(&[("old-name", "vpc-1", "s-1")], 5);

    assert!(diff_mount_points(&desired, &observed).is_empty());
}

#[rstest]
fn steps_follow_fixed_order(mut observed: VolumeState) {
    observed.name = String::from("old");
    let snapshot = Snapshot {
        volume: observed,
        mount_points: inventory(&[("gone", "vpc-9", "s-9")], 5),
    };
    let mount_points = desired(&[("a", "vpc-1", "s-1")]);

    let steps = plan(&spec(600), &mount_points, &snapshot)
        .expect("plan")
        .steps();

    let operations: Vec<Operation> = steps.iter().map(Step::operation).collect();
    assert_eq!(
        operations,
        vec![
            Operation::UpdateVolumeInfo,
            Operation::ExtendVolume,
            Operation::RemoveMountPoint,
            Operation::AddMountPoint,
        ]
    );
}

#[rstest]
fn plan_rejects_additions_beyond_capacity(observed: VolumeState) {
    let snapshot = Snapshot {
        volume: observed,
        mount_points: inventory(&[("a", "vpc-1", "s-1"), ("b", "vpc-1", "s-2")], 3),
    };
    let mount_points = desired(&[
        ("a", "vpc-1", "s-1"),
        ("b", "vpc-1", "s-2"),
        ("c", "vpc-1", "s-3"),
        ("d", "vpc-1", "s-4"),
    ]);

    let err = plan(&spec(500), &mount_points, &snapshot).expect_err("over capacity");

    assert_eq!(
        err,
        ValidationError::MountPointCapacity {
            volume_id: VolumeId::new("vol-1"),
            maximum: 3,
            projected: 4,
        }
    );
}

#[rstest]
fn plan_counts_removals_before_additions(observed: VolumeState) {
    let snapshot = Snapshot {
        volume: observed,
        mount_points: inventory(&[("a", "vpc-1", "s-1"), ("b", "vpc-1", "s-2")], 2),
    };
    let mount_points = desired(&[("a", "vpc-1", "s-1"), ("c", "vpc-1", "s-3")]);

    let plan = plan(&spec(500), &mount_points, &snapshot).expect("fits after removal");

    assert_eq!(plan.mount_points.to_remove.len(), 1);
    assert_eq!(plan.mount_points.to_add.len(), 1);
}

#[rstest]
fn plan_rejects_mount_point_owned_by_another_volume(observed: VolumeState) {
    let snapshot = Snapshot {
        volume: observed,
        mount_points: inventory(&[], 5),
    };
    let mount_points = MountPointSet::from_specs([
        MountPointSpec::new("a", "vpc-1", "s-1").volume_id("vol-other"),
    ])
    .expect("valid set");

    let err = plan(&spec(500), &mount_points, &snapshot).expect_err("foreign owner");

    assert!(matches!(err, ValidationError::MountPointOwner { .. }));
}

#[rstest]
fn applying_a_plan_to_its_target_yields_an_empty_plan(mut observed: VolumeState) {
    let target = spec(700).name("renamed");
    let mount_points = desired(&[("a", "vpc-1", "s-1")]);
    let before = Snapshot {
        volume: observed.clone(),
        mount_points: inventory(&[("z", "vpc-3", "s-3")], 5),
    };
    assert!(!plan(&target, &mount_points, &before).expect("plan").is_empty());

    observed.size_gb = 700;
    observed.name = String::from("renamed");
    let after = Snapshot {
        volume: observed,
        mount_points: inventory(&[("a", "vpc-1", "s-1")], 5),
    };
    assert!(plan(&target, &mount_points, &after).expect("plan").is_empty());
}
