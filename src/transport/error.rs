//! Error taxonomy shared by every node transport.

use std::net::IpAddr;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::runtime::RuntimeError;

use super::{Capability, CommandResult};

/// Failures raised while resolving a node address to a live execution target.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LocateError {
    /// No live target carries the requested address.
    #[error("no running container has address {address}")]
    NoMatch {
        /// Address that was looked up.
        address: IpAddr,
    },
    /// More than one live target carries the requested address.
    #[error("{matches} running containers share address {address}")]
    AmbiguousMatch {
        /// Address that was looked up.
        address: IpAddr,
        /// Number of targets that matched.
        matches: usize,
    },
    /// The runtime inventory could not be listed.
    #[error("failed to list running containers: {0}")]
    Inventory(#[source] RuntimeError),
}

/// Errors surfaced by [`NodeTransport`](super::NodeTransport) operations.
///
/// Nothing is retried internally; every variant reaches the immediate caller.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Target resolution failed.
    #[error(transparent)]
    Locate(#[from] LocateError),
    /// The remote process could not be started.
    #[error("remote command failed to start: {message}")]
    ExecutionStartFailure {
        /// Human readable cause.
        message: String,
    },
    /// Reading the remote output stream failed before it was exhausted.
    #[error("remote output stream failed: {message}")]
    OutputStream {
        /// Human readable cause.
        message: String,
    },
    /// The remote process finished without a usable exit status.
    #[error("remote command did not report an exit status: {message}")]
    ExitStatusUnavailable {
        /// Human readable cause.
        message: String,
    },
    /// The remote command ran and exited with a non-zero status.
    #[error("`{}` exited with status {}", .0.command_line(), .0.exit_code())]
    NonZeroExit(Box<CommandResult>),
    /// The transport does not implement the requested operation.
    #[error("the {transport} transport does not support {operation}")]
    Unsupported {
        /// Name of the transport that refused the call.
        transport: &'static str,
        /// Operation that was requested.
        operation: Capability,
    },
    /// The local file to send could not be read.
    #[error("failed to read local file {path}: {message}")]
    LocalReadFailure {
        /// Local path that was requested.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// The node could not be reached while delivering a file.
    #[error("node unreachable during file transfer: {message}")]
    TargetUnreachable {
        /// Human readable cause.
        message: String,
    },
    /// The node refused to write the file at the requested location.
    #[error("failed to write {path} on the node: {message}")]
    RemoteWriteFailure {
        /// Remote path that was requested.
        path: Utf8PathBuf,
        /// Human readable cause.
        message: String,
    },
}

impl TransportError {
    /// Returns the finished command when this error is a non-zero exit.
    #[must_use]
    pub fn non_zero_exit(&self) -> Option<&CommandResult> {
        match self {
            Self::NonZeroExit(result) => Some(result),
            _ => None,
        }
    }
}
