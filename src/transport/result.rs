//! Terminal artefact of a finished remote command.

use std::borrow::Cow;

/// Outcome of a remote command that ran to completion.
///
/// Values are immutable once built; transports construct them after the
/// remote process has exited and hand them to the caller unchanged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandResult {
    args: Vec<String>,
    exit_code: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CommandResult {
    /// Builds a result from its parts.
    #[must_use]
    pub const fn new(args: Vec<String>, exit_code: i32, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            args,
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Command vector that produced this result.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Exit code reported by the remote process.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Captured standard output bytes.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Captured standard error bytes. Always empty for the container-exec
    /// transport, which cannot separate the two streams.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output decoded lossily.
    #[must_use]
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Standard error decoded lossily.
    #[must_use]
    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Renders the command vector as a single space separated line.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}
