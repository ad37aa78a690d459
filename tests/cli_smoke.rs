//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use predicates::str::contains;
use tempfile::TempDir;

fn write_desired(contents: &str) -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    Dir::open_ambient_dir(&root, ambient_authority())
        .unwrap_or_else(|err| panic!("open temp dir: {err}"))
        .write("desired.json", contents)
        .unwrap_or_else(|err| panic!("write desired state: {err}"));
    (tmp, root.join("desired.json"))
}

#[test]
fn cli_help_lists_lifecycle_commands() {
    let mut cmd = cargo_bin_cmd!("ufs-reconciler");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(contains("create"))
        .stdout(contains("converge"))
        .stdout(contains("apply"))
        .stdout(contains("delete"));
}

#[test]
fn cli_without_subcommand_fails() {
    let mut cmd = cargo_bin_cmd!("ufs-reconciler");
    cmd.assert().failure();
}

#[test]
fn cli_reports_malformed_desired_state() {
    let (_tmp, path) = write_desired("{ \"volume\": ");
    let mut cmd = cargo_bin_cmd!("ufs-reconciler");
    cmd.args(["converge", "--volume-id", "vol-1", path.as_str()]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("failed to parse desired state"));
}

#[test]
fn cli_reports_missing_desired_state() {
    let mut cmd = cargo_bin_cmd!("ufs-reconciler");
    cmd.args(["create", "/nonexistent/ufs-desired.json"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("failed to read desired state"));
}

#[test]
fn cli_reports_missing_configuration() {
    let (_tmp, path) = write_desired(
        r#"{ "volume": { "protocol": "NFSv4", "storage_class": "Basic", "size_gb": 500 } }"#,
    );
    let mut cmd = cargo_bin_cmd!("ufs-reconciler");
    cmd.env_remove("UFS_REGION");
    cmd.env_remove("UFS_PROJECT_ID");
    cmd.env_remove("UFS_ENDPOINT");
    cmd.args(["create", path.as_str()]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("configuration"));
}
