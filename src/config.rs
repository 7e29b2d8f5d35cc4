//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default timeout applied to Docker API requests, in seconds.
pub const DEFAULT_DOCKER_TIMEOUT_SECS: u64 = 120;

/// Docker daemon connection settings derived from defaults, configuration
/// files and environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "STEVEDORE_DOCKER",
    discovery(
        app_name = "stevedore",
        env_var = "STEVEDORE_CONFIG_PATH",
        config_file_name = "stevedore.toml",
        dotfile_name = ".stevedore.toml",
        project_file_name = "stevedore.toml"
    )
)]
pub struct DockerConfig {
    /// Daemon address such as `unix:///var/run/docker.sock` or
    /// `tcp://10.0.0.5:2375`. When unset the local defaults apply, which
    /// honour `DOCKER_HOST`.
    pub host: Option<String>,
    /// Timeout for individual API requests, in seconds.
    #[ortho_config(default = DEFAULT_DOCKER_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
pub(crate) struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    pub(crate) const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }

    fn guidance(&self) -> String {
        format!(
            "{}: set {} or add {} to [{}] in stevedore.toml",
            self.description, self.env_var, self.toml_key, self.section
        )
    }
}

/// Rejects empty or whitespace-only values.
pub(crate) fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "missing {}",
            metadata.guidance()
        )));
    }
    Ok(())
}

impl DockerConfig {
    /// Settings that connect to the local daemon with the default timeout.
    #[must_use]
    pub const fn local() -> Self {
        Self {
            host: None,
            timeout_secs: DEFAULT_DOCKER_TIMEOUT_SECS,
        }
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("stevedore")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide values via environment variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `host` is set but blank and
    /// [`ConfigError::OutOfRange`] when the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(host) = self.host.as_deref() {
            require_field(
                host,
                &FieldMetadata::new("Docker host", "STEVEDORE_DOCKER_HOST", "host", "docker"),
            )?;
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::OutOfRange(format!(
                "timeout must be at least one second; {}",
                FieldMetadata::new(
                    "Docker API timeout",
                    "STEVEDORE_DOCKER_TIMEOUT_SECS",
                    "timeout_secs",
                    "docker",
                )
                .guidance()
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value falls outside its accepted range.
    #[error("configuration value out of range: {0}")]
    OutOfRange(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
