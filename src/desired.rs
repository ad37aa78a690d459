//! Desired-state documents read from disk.
//!
//! A document names the volume attributes and the full set of mount points:
//!
//! ```json
//! {
//!   "volume": { "protocol": "NFSv4", "storage_class": "Basic", "size_gb": 500 },
//!   "mount_points": [ { "name": "app", "vpc_id": "vpc-1", "subnet_id": "subnet-1" } ]
//! }
//! ```

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;

use crate::model::{MountPointSet, MountPointSpec, ValidationError, VolumeSpec};

/// Errors raised while loading a desired-state document.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DesiredStateError {
    /// Raised when the file cannot be read.
    #[error("failed to read desired state `{path}`: {message}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the document is not valid JSON or has the wrong shape.
    #[error("failed to parse desired state `{path}`: {message}")]
    Parse {
        /// Path of the document.
        path: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the mount points break a model invariant.
    #[error("invalid desired state `{path}`: {source}")]
    Invalid {
        /// Path of the document.
        path: String,
        /// Violated invariant.
        #[source]
        source: ValidationError,
    },
}

/// Desired volume attributes and mount points.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct DesiredState {
    /// Desired volume attributes.
    pub volume: VolumeSpec,
    /// Full set of desired mount points. Omitted means none.
    #[serde(default)]
    pub mount_points: Vec<MountPointSpec>,
}

impl DesiredState {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the document is malformed.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Reads and parses a document from `path`, relative paths resolving
    /// against the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`DesiredStateError`] when the file cannot be read, parsed, or
    /// holds an invalid mount point set.
    pub fn load(path: &Utf8Path) -> Result<Self, DesiredStateError> {
        let text = read_to_string_ambient(path).map_err(|message| DesiredStateError::Read {
            path: path.to_string(),
            message,
        })?;
        let desired = Self::from_json(&text).map_err(|err| DesiredStateError::Parse {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        desired
            .mount_point_set()
            .map_err(|source| DesiredStateError::Invalid {
                path: path.to_string(),
                source,
            })?;
        Ok(desired)
    }

    /// Builds the keyed mount point set.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] on duplicate keys or blank fields.
    pub fn mount_point_set(&self) -> Result<MountPointSet, ValidationError> {
        MountPointSet::from_specs(self.mount_points.iter().cloned())
    }
}

fn read_to_string_ambient(path: &Utf8Path) -> Result<String, String> {
    let (dir_path, file_path) = if path.is_absolute() {
        let parent = path
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path}"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
