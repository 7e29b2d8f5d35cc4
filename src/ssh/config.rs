//! SSH client settings loaded via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::config::{ConfigError, FieldMetadata, require_field};

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Settings for the system `ssh` and `scp` clients.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "STEVEDORE_SSH",
    discovery(
        app_name = "stevedore",
        env_var = "STEVEDORE_CONFIG_PATH",
        config_file_name = "stevedore.toml",
        dotfile_name = ".stevedore.toml",
        project_file_name = "stevedore.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Port the nodes accept SSH connections on.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub port: u16,
    /// Whether to force batch mode so a missing key fails instead of
    /// prompting.
    #[ortho_config(default = true)]
    pub batch_mode: bool,
    /// Whether to enforce host key checking; cluster nodes are recreated
    /// often, so it is off by default.
    #[ortho_config(default = false)]
    pub strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub known_hosts_file: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            bin: String::from("ssh"),
            scp_bin: String::from("scp"),
            port: DEFAULT_SSH_PORT,
            batch_mode: true,
            strict_host_key_checking: false,
            known_hosts_file: String::from("/dev/null"),
        }
    }
}

impl SshConfig {
    /// Loads configuration from defaults, configuration files and
    /// environment variables, ignoring the process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("stevedore")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Ensures the client paths are present and the port is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for blank client paths and
    /// [`ConfigError::OutOfRange`] for port zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.bin,
            &FieldMetadata::new("ssh client", "STEVEDORE_SSH_BIN", "bin", "ssh"),
        )?;
        require_field(
            &self.scp_bin,
            &FieldMetadata::new("scp client", "STEVEDORE_SSH_SCP_BIN", "scp_bin", "ssh"),
        )?;
        if self.port == 0 {
            return Err(ConfigError::OutOfRange(String::from(
                "ssh port must be between 1 and 65535: set STEVEDORE_SSH_PORT or add port to [ssh] in stevedore.toml",
            )));
        }
        Ok(())
    }
}
