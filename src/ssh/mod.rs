//! Node transport built on the system `ssh` and `scp` clients.
//!
//! Unlike container exec, SSH keeps stdout and stderr apart and can hand a
//! live process to the caller, so this transport implements every operation
//! of the contract.

use crate::config::ConfigError;
use crate::local_file::ensure_readable;
use crate::transport::{
    Capabilities, Capability, CommandResult, NodeTransport, OutputSink, PipedProcess,
    PopenRequest, RunRequest, SendFileRequest, TracingSink, TransportError,
};

mod command;
mod config;
mod runner;

pub use command::{Destination, expand_home, render_remote_command, scp_args, ssh_args};
pub use config::{DEFAULT_SSH_PORT, SshConfig};
pub use runner::{CommandOutput, CommandRunner, OutputMode, ProcessCommandRunner, RunnerError};

/// Name reported in [`TransportError::Unsupported`].
pub const TRANSPORT_NAME: &str = "ssh";

/// SSH implementation of [`NodeTransport`].
#[derive(Clone, Debug)]
pub struct SshTransport<R: CommandRunner, S = TracingSink> {
    config: SshConfig,
    runner: R,
    sink: S,
}

impl SshTransport<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn with_process_runner(config: SshConfig) -> Result<Self, ConfigError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshTransport<R> {
    /// Creates a transport using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration validation fails.
    pub fn new(config: SshConfig, runner: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            runner,
            sink: TracingSink,
        })
    }
}

impl<R: CommandRunner, S> SshTransport<R, S> {
    /// Replaces the live output sink.
    #[must_use]
    pub fn with_sink<T: OutputSink>(self, sink: T) -> SshTransport<R, T> {
        SshTransport {
            config: self.config,
            runner: self.runner,
            sink,
        }
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }
}

impl<R: CommandRunner, S: OutputSink> NodeTransport for SshTransport<R, S> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn run(&self, request: &RunRequest) -> Result<CommandResult, TransportError> {
        let remote = render_remote_command(&request.args, &request.env)?;
        let destination = Destination {
            address: request.address,
            user: &request.user,
            key: request.ssh_key_path.as_deref(),
        };
        let args = ssh_args(&self.config, destination, request.tty, &remote);
        let mode = if request.tty {
            OutputMode::Inherit
        } else if request.log_output_live {
            OutputMode::Live(&self.sink)
        } else {
            OutputMode::Capture
        };
        tracing::debug!(address = %request.address, user = %request.user, "running command over ssh");

        let output = self
            .runner
            .run(&self.config.bin, &args, mode)
            .map_err(|err| TransportError::ExecutionStartFailure {
                message: err.to_string(),
            })?;
        let Some(code) = output.code else {
            return Err(TransportError::ExitStatusUnavailable {
                message: format!("{} terminated by a signal", self.config.bin),
            });
        };

        let result = CommandResult::new(request.args.clone(), code, output.stdout, output.stderr);
        if result.is_success() {
            return Ok(result);
        }
        if !request.log_output_live {
            tracing::warn!(
                command = %result.command_line(),
                exit_code = code,
                "remote command failed"
            );
        }
        Err(TransportError::NonZeroExit(Box::new(result)))
    }

    fn popen(&self, request: &PopenRequest) -> Result<PipedProcess, TransportError> {
        self.capabilities().ensure(TRANSPORT_NAME, Capability::Popen)?;
        let remote = render_remote_command(&request.args, &request.env)?;
        let destination = Destination {
            address: request.address,
            user: &request.user,
            key: request.ssh_key_path.as_deref(),
        };
        let args = ssh_args(&self.config, destination, false, &remote);
        let child = self
            .runner
            .spawn(&self.config.bin, &args)
            .map_err(|err| TransportError::ExecutionStartFailure {
                message: err.to_string(),
            })?;
        Ok(PipedProcess::new(request.args.clone(), child))
    }

    fn send_file(&self, request: &SendFileRequest) -> Result<(), TransportError> {
        ensure_readable(&request.local_path).map_err(|message| {
            TransportError::LocalReadFailure {
                path: request.local_path.clone(),
                message,
            }
        })?;
        let destination = Destination {
            address: request.address,
            user: &request.user,
            key: request.ssh_key_path.as_deref(),
        };
        let args = scp_args(
            &self.config,
            destination,
            &request.local_path,
            &request.remote_path,
        );

        let output = self
            .runner
            .run(&self.config.scp_bin, &args, OutputMode::Capture)
            .map_err(|err| TransportError::TargetUnreachable {
                message: err.to_string(),
            })?;
        if output.code == Some(0) {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(TransportError::RemoteWriteFailure {
            path: request.remote_path.clone(),
            message: format!(
                "{} exited with status {}: {}",
                self.config.scp_bin,
                output
                    .code
                    .map_or_else(|| String::from("unknown"), |code| code.to_string()),
                stderr.trim_end()
            ),
        })
    }
}
