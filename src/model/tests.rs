//! Unit tests for model invariants.

use super::*;
use rstest::rstest;

#[rstest]
#[case(StorageClass::Advanced, 100)]
#[case(StorageClass::Advanced, 200)]
#[case(StorageClass::Basic, 500)]
#[case(StorageClass::Basic, 1200)]
fn size_rules_accept_valid_sizes(#[case] storage_class: StorageClass, #[case] size_gb: u64) {
    assert_eq!(SizeRules::default().check(storage_class, size_gb), Ok(()));
}

#[rstest]
#[case(StorageClass::Advanced, 50)]
#[case(StorageClass::Basic, 400)]
fn size_rules_reject_sizes_below_minimum(
    #[case] storage_class: StorageClass,
    #[case] size_gb: u64,
) {
    let err = SizeRules::default()
        .check(storage_class, size_gb)
        .expect_err("size below minimum");
    assert!(
        matches!(err, ValidationError::SizeBelowMinimum { .. }),
        "unexpected error: {err}"
    );
}

#[rstest]
fn size_rules_reject_sizes_off_step() {
    let err = SizeRules::default()
        .check(StorageClass::Advanced, 150)
        .expect_err("size off step");
    assert_eq!(
        err,
        ValidationError::SizeNotMultiple {
            storage_class: StorageClass::Advanced,
            step_gb: 100,
            size_gb: 150,
        }
    );
}

#[rstest]
fn regional_basic_rules_use_kibi_steps() {
    let rules = SizeRules {
        basic: SizeRule {
            minimum_gb: 1024,
            step_gb: 1024,
        },
        ..SizeRules::default()
    };
    assert!(rules.check(StorageClass::Basic, 1000).is_err());
    assert!(rules.check(StorageClass::Basic, 1500).is_err());
    assert!(rules.check(StorageClass::Basic, 2048).is_ok());
}

#[rstest]
fn spec_rejects_blank_name_and_zero_quantity() {
    let rules = SizeRules::default();
    let blank = VolumeSpec::new(ProtocolType::NfsV3, StorageClass::Advanced, 100).name("  ");
    assert_eq!(
        blank.validate(&rules),
        Err(ValidationError::EmptyField(String::from("name")))
    );

    let zero = VolumeSpec::new(ProtocolType::NfsV4, StorageClass::Advanced, 100).quantity(0);
    assert_eq!(zero.validate(&rules), Err(ValidationError::ZeroQuantity));
}

#[rstest]
#[case("NFSv3", Some(ProtocolType::NfsV3))]
#[case("nfsv4", Some(ProtocolType::NfsV4))]
#[case(" NFSv4 ", Some(ProtocolType::NfsV4))]
#[case("SMB", None)]
fn protocol_tokens_parse_case_insensitively(
    #[case] token: &str,
    #[case] expected: Option<ProtocolType>,
) {
    assert_eq!(ProtocolType::from_wire(token), expected);
}

#[rstest]
fn spec_deserialises_with_default_charge_mode() {
    let spec: VolumeSpec = serde_json::from_str(
        r#"{"protocol":"NFSv4","storage_class":"Basic","size_gb":500,"name":"data"}"#,
    )
    .expect("spec should parse");
    assert_eq!(spec.charge_mode, ChargeMode::Month);
    assert_eq!(spec.storage_class, StorageClass::Basic);
    assert_eq!(spec.name.as_deref(), Some("data"));
}

#[rstest]
fn mount_point_set_rejects_duplicate_keys() {
    let err = MountPointSet::from_specs([
        MountPointSpec::new("a", "vpc-a", "subnet-a"),
        MountPointSpec::new("b", "vpc-a", "subnet-a"),
    ])
    .expect_err("duplicate key");
    assert_eq!(
        err,
        ValidationError::DuplicateMountPoint(MountPointKey::new("vpc-a", "subnet-a"))
    );
}

#[rstest]
fn mount_point_set_allows_same_vpc_different_subnet() {
    let set = MountPointSet::from_specs([
        MountPointSpec::new("a", "vpc-a", "subnet-a"),
        MountPointSpec::new("b", "vpc-a", "subnet-b"),
    ])
    .expect("distinct keys");
    assert_eq!(set.len(), 2);
    assert!(!set.is_empty());
}

#[rstest]
fn empty_mount_point_set_reports_no_entries() {
    let set = MountPointSet::new();
    assert_eq!(set.len(), 0);
    assert!(set.is_empty());
}

#[rstest]
fn mount_point_set_rejects_blank_subnet() {
    let err = MountPointSet::from_specs([MountPointSpec::new("a", "vpc-a", " ")])
        .expect_err("blank subnet");
    assert_eq!(
        err,
        ValidationError::EmptyField(String::from("mount_points.subnet_id"))
    );
}

#[rstest]
fn mount_point_set_checks_owner() {
    let set = MountPointSet::from_specs([
        MountPointSpec::new("a", "vpc-a", "subnet-a").volume_id("vol-other")
    ])
    .expect("set");
    let err = set
        .check_owner(&VolumeId::new("vol-1"))
        .expect_err("owner mismatch");
    assert!(matches!(err, ValidationError::MountPointOwner { .. }));
    assert!(set.check_owner(&VolumeId::new("vol-other")).is_ok());
}
