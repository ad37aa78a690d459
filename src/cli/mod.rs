//! Command-line interface definitions for the `ufs-reconciler` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{Args, Parser};

/// Top-level CLI for the `ufs-reconciler` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ufs-reconciler",
    about = "Reconcile a managed network file storage volume and its mount points",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create a volume from a desired-state file and wait until it is ready.
    #[command(name = "create", about = "Create a volume and wait until it is ready")]
    Create(CreateCommand),
    /// Print the observed volume and mount points.
    #[command(name = "read", about = "Print the observed volume and mount points")]
    Read(VolumeArgs),
    /// Converge an existing volume onto a desired-state file.
    #[command(
        name = "converge",
        about = "Converge an existing volume onto a desired-state file"
    )]
    Converge(ConvergeCommand),
    /// Create when needed, then converge attributes and mount points.
    #[command(
        name = "apply",
        about = "Create when needed, then converge attributes and mount points"
    )]
    Apply(ApplyCommand),
    /// Remove every mount point and then the volume.
    #[command(name = "delete", about = "Remove every mount point and then the volume")]
    Delete(VolumeArgs),
}

/// Identifies an existing volume.
#[derive(Debug, Args)]
pub(crate) struct VolumeArgs {
    /// Identifier assigned by the control plane.
    #[arg(long, value_name = "ID")]
    pub(crate) volume_id: String,
}

/// Arguments for the `ufs-reconciler create` subcommand.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    /// Desired-state JSON document. Only the volume section is used.
    #[arg(value_name = "PATH")]
    pub(crate) desired: Utf8PathBuf,
    /// Give up waiting for readiness after this many seconds, even if the
    /// configured poll timeout is longer.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) deadline_secs: Option<u64>,
}

/// Arguments for the `ufs-reconciler converge` subcommand.
#[derive(Debug, Args)]
pub(crate) struct ConvergeCommand {
    /// Identifier assigned by the control plane.
    #[arg(long, value_name = "ID")]
    pub(crate) volume_id: String,
    /// Desired-state JSON document.
    #[arg(value_name = "PATH")]
    pub(crate) desired: Utf8PathBuf,
}

/// Arguments for the `ufs-reconciler apply` subcommand.
#[derive(Debug, Args)]
pub(crate) struct ApplyCommand {
    /// Existing volume to converge. A new volume is created when omitted.
    #[arg(long, value_name = "ID")]
    pub(crate) volume_id: Option<String>,
    /// Desired-state JSON document.
    #[arg(value_name = "PATH")]
    pub(crate) desired: Utf8PathBuf,
}
