//! Binary entry point for the `ufs-reconciler` CLI.

mod cli;

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use serde_json::json;
use thiserror::Error;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use ufs_reconciler::config::ConfigError;
use ufs_reconciler::desired::{DesiredState, DesiredStateError};
use ufs_reconciler::gateway::http::HttpGateway;
use ufs_reconciler::reconcile::deadline_after;
use ufs_reconciler::{Failure, ReconcilerConfig, Reconciler, Report, ValidationError, VolumeId};

use cli::Cli;

const LOG_ENV: &str = "UFS_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Desired(#[from] DesiredStateError),
    #[error("invalid desired state: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Reconcile(Box<Failure>),
    #[error("failed to write report: {0}")]
    Output(String),
}

impl From<Failure> for CliError {
    fn from(failure: Failure) -> Self {
        Self::Reconcile(Box::new(failure))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    let exit_code = match dispatch(cli).await {
        Ok(report) => match write_report(io::stdout(), &report) {
            Ok(()) => 0,
            Err(err) => {
                report_error(&err);
                1
            }
        },
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init()
        .ok();
}

fn reconciler() -> Result<Reconciler<HttpGateway>, CliError> {
    let config = ReconcilerConfig::load_without_cli_args()?;
    config.validate()?;
    let gateway = HttpGateway::new(
        config.gateway_context(),
        config.endpoint.as_str(),
        config.request_timeout(),
    );
    Ok(Reconciler::new(
        gateway,
        config.retrier(),
        config.reconciler_settings(),
    ))
}

async fn dispatch(cli: Cli) -> Result<Report, CliError> {
    match cli {
        Cli::Create(command) => {
            let desired = DesiredState::load(&command.desired)?;
            let deadline = command
                .deadline_secs
                .map(|secs| deadline_after(Instant::now(), Duration::from_secs(secs)));
            Ok(reconciler()?
                .create_until(&desired.volume, deadline)
                .await?)
        }
        Cli::Read(args) => Ok(reconciler()?.read(&VolumeId::new(args.volume_id)).await?),
        Cli::Converge(command) => {
            let desired = DesiredState::load(&command.desired)?;
            let mount_points = desired.mount_point_set()?;
            Ok(reconciler()?
                .converge(&VolumeId::new(command.volume_id), &desired.volume, &mount_points)
                .await?)
        }
        Cli::Apply(command) => {
            let desired = DesiredState::load(&command.desired)?;
            let mount_points = desired.mount_point_set()?;
            let volume_id = command.volume_id.map(VolumeId::new);
            Ok(reconciler()?
                .apply(volume_id.as_ref(), &desired.volume, &mount_points)
                .await?)
        }
        Cli::Delete(args) => Ok(reconciler()?.delete(&VolumeId::new(args.volume_id)).await?),
    }
}

fn write_report(mut target: impl Write, report: &Report) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut target, report)
        .map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target).map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    if let CliError::Reconcile(failure) = err {
        write_failure(io::stdout(), failure);
    }
    write_error(io::stderr(), err);
}

/// Writes the partial progress of a failed pass so callers can resume.
fn write_failure(mut target: impl Write, failure: &Failure) {
    let body = json!({
        "error": failure.error.to_string(),
        "kind": failure.kind().as_str(),
        "phase": failure.phase,
        "failed_in": failure.failed_in,
        "volume_id": failure.volume_id,
        "applied": failure.applied,
        "failed_step": failure.failed_step,
        "snapshot": failure.snapshot,
    });
    serde_json::to_writer_pretty(&mut target, &body).ok();
    writeln!(target).ok();
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ufs_reconciler::reconcile::{Phase, ReconcileError};

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::Invalid(ValidationError::ZeroQuantity);
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("quantity must be positive"),
            "rendered: {rendered}"
        );
    }

    #[test]
    fn write_report_emits_json() {
        let report = Report {
            volume_id: VolumeId::new("vol-1"),
            phase: Phase::Absent,
            snapshot: None,
            applied: Vec::new(),
        };
        let mut buf = Vec::new();
        write_report(&mut buf, &report).expect("writes");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["volume_id"], "vol-1");
        assert_eq!(value["phase"], "absent");
    }

    #[test]
    fn write_failure_includes_kind_and_phase() {
        let failure = Failure {
            error: Box::new(ReconcileError::NotFound {
                volume_id: VolumeId::new("vol-1"),
            }),
            phase: Phase::Failed,
            failed_in: Phase::Converging,
            volume_id: Some(VolumeId::new("vol-1")),
            applied: Vec::new(),
            failed_step: None,
            snapshot: None,
        };
        let mut buf = Vec::new();
        write_failure(&mut buf, &failure);
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["kind"], "not_found");
        assert_eq!(value["failed_in"], "converging");
    }
}
