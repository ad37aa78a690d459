//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::gateway::GatewayContext;
use crate::model::{SizeRule, SizeRules};
use crate::reconcile::ReconcilerSettings;
use crate::retry::{Retrier, RetryPolicy, RetryTable};

/// Reconciler configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "UFS")]
pub struct ReconcilerConfig {
    /// Region the volumes live in. Required.
    pub region: String,
    /// Project used for billing and ownership. Required.
    pub project_id: String,
    /// Control-plane endpoint URL. Required.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
    /// Attempts per retried operation, including the first.
    #[ortho_config(default = 5)]
    pub retry_max_attempts: u32,
    /// Backoff base in milliseconds; doubles after every failed attempt.
    #[ortho_config(default = 500)]
    pub retry_base_delay_ms: u64,
    /// Delay between readiness polls in seconds.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Upper bound on the readiness poll in seconds.
    #[ortho_config(default = 600)]
    pub poll_timeout_secs: u64,
    /// Volumes requested per listing page.
    #[ortho_config(default = 50)]
    pub page_size: u64,
    /// Minimum size of a Basic volume in gigabytes. Some regions use 1024.
    #[ortho_config(default = 500)]
    pub basic_min_size_gb: u64,
    /// Size step of a Basic volume in gigabytes.
    #[ortho_config(default = 100)]
    pub basic_step_gb: u64,
    /// Minimum size of an Advanced volume in gigabytes.
    #[ortho_config(default = 100)]
    pub advanced_min_size_gb: u64,
    /// Size step of an Advanced volume in gigabytes.
    #[ortho_config(default = 100)]
    pub advanced_step_gb: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to ufs.toml",
            self.env_var, self.toml_key
        )
    }
}

impl ReconcilerConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be positive: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("ufs-reconciler")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide missing values via environment variables or configuration
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a numeric field is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.region,
            &FieldMetadata::new("region", "UFS_REGION", "region"),
        )?;
        Self::require_field(
            &self.project_id,
            &FieldMetadata::new("project ID", "UFS_PROJECT_ID", "project_id"),
        )?;
        Self::require_field(
            &self.endpoint,
            &FieldMetadata::new("control-plane endpoint", "UFS_ENDPOINT", "endpoint"),
        )?;
        Self::require_positive(
            self.request_timeout_secs,
            &FieldMetadata::new(
                "request timeout",
                "UFS_REQUEST_TIMEOUT_SECS",
                "request_timeout_secs",
            ),
        )?;
        Self::require_positive(
            u64::from(self.retry_max_attempts),
            &FieldMetadata::new(
                "retry attempt count",
                "UFS_RETRY_MAX_ATTEMPTS",
                "retry_max_attempts",
            ),
        )?;
        Self::require_positive(
            self.retry_base_delay_ms,
            &FieldMetadata::new(
                "retry base delay",
                "UFS_RETRY_BASE_DELAY_MS",
                "retry_base_delay_ms",
            ),
        )?;
        Self::require_positive(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "poll interval",
                "UFS_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )?;
        Self::require_positive(
            self.page_size,
            &FieldMetadata::new("page size", "UFS_PAGE_SIZE", "page_size"),
        )?;
        Self::require_positive(
            self.basic_step_gb,
            &FieldMetadata::new("Basic size step", "UFS_BASIC_STEP_GB", "basic_step_gb"),
        )?;
        Self::require_positive(
            self.advanced_step_gb,
            &FieldMetadata::new(
                "Advanced size step",
                "UFS_ADVANCED_STEP_GB",
                "advanced_step_gb",
            ),
        )?;
        Ok(())
    }

    /// Region and project scoping for the gateway.
    #[must_use]
    pub fn gateway_context(&self) -> GatewayContext {
        GatewayContext::new(self.region.as_str(), self.project_id.as_str())
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry engine with the configured policy and the default table.
    #[must_use]
    pub fn retrier(&self) -> Retrier {
        Retrier::new(
            RetryPolicy::new(
                self.retry_max_attempts,
                Duration::from_millis(self.retry_base_delay_ms),
            ),
            RetryTable::default(),
        )
    }

    /// Size rules per storage class.
    #[must_use]
    pub const fn size_rules(&self) -> SizeRules {
        SizeRules {
            basic: SizeRule {
                minimum_gb: self.basic_min_size_gb,
                step_gb: self.basic_step_gb,
            },
            advanced: SizeRule {
                minimum_gb: self.advanced_min_size_gb,
                step_gb: self.advanced_step_gb,
            },
        }
    }

    /// Poll and paging settings for the reconciler.
    #[must_use]
    pub const fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_timeout: Duration::from_secs(self.poll_timeout_secs),
            page_size: self.page_size,
            size_rules: self.size_rules(),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is out of range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
