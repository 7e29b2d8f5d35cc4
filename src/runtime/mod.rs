//! Container runtime abstraction consumed by the container-exec transport.
//!
//! The transport never holds a runtime client between operations. It asks a
//! [`RuntimeConnector`] for a fresh [`ContainerRuntime`] on every call, which
//! keeps stale handles out of the picture and lets tests swap in the scripted
//! runtime from [`crate::test_support`].

use std::collections::BTreeMap;
use std::fmt;

use camino::Utf8Path;
use thiserror::Error;

pub mod docker;

pub use docker::{DockerConnector, DockerEngine};

/// A live container backing a node at the time of the query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionTarget {
    /// Runtime identifier of the container.
    pub id: String,
    /// Container name, when the runtime reports one.
    pub name: Option<String>,
    /// Address assigned on the container's primary network.
    pub address: Option<String>,
}

impl ExecutionTarget {
    /// Creates a target with an address on the primary network.
    #[must_use]
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            address: Some(address.into()),
        }
    }
}

/// Opaque identifier of one exec instance.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ExecId(String);

impl ExecId {
    /// Wraps a runtime-issued identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as issued by the runtime.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings for creating an exec instance inside a target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecSpec {
    /// Program and arguments, executed directly.
    pub command: Vec<String>,
    /// Identity the process runs as.
    pub user: String,
    /// Variables applied to this process only.
    pub environment: BTreeMap<String, String>,
    /// Whether a pseudo-terminal is allocated.
    pub tty: bool,
}

impl ExecSpec {
    /// Renders the environment as `KEY=VALUE` strings in key order.
    #[must_use]
    pub fn environment_pairs(&self) -> Vec<String> {
        self.environment
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }
}

/// Lazily produced output chunks of a running exec.
pub type OutputStream<'a> = Box<dyn Iterator<Item = Result<Vec<u8>, RuntimeError>> + 'a>;

/// Operations the transport needs from a container runtime.
pub trait ContainerRuntime {
    /// Lists the running containers with their primary network address.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the inventory cannot be queried.
    fn list_targets(&self) -> Result<Vec<ExecutionTarget>, RuntimeError>;

    /// Creates an exec instance bound to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the runtime refuses the exec.
    fn create_exec(&self, target: &ExecutionTarget, spec: &ExecSpec)
    -> Result<ExecId, RuntimeError>;

    /// Starts a previously created exec and attaches to its output.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the exec cannot be started.
    fn start_exec(&self, exec_id: &ExecId, tty: bool) -> Result<OutputStream<'_>, RuntimeError>;

    /// Reads the exit code of an exec; `None` while it is still running.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the exec cannot be inspected.
    fn exec_exit_code(&self, exec_id: &ExecId) -> Result<Option<i64>, RuntimeError>;

    /// Extracts a tar archive into `destination` inside `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NotFound`] when the destination is missing and
    /// another [`RuntimeError`] when the upload fails.
    fn put_archive(
        &self,
        target: &ExecutionTarget,
        destination: &Utf8Path,
        archive: Vec<u8>,
    ) -> Result<(), RuntimeError>;
}

/// Factory producing a fresh runtime client per operation.
pub trait RuntimeConnector {
    /// Client type produced by this connector.
    type Runtime: ContainerRuntime;

    /// Connects a new client.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Unreachable`] when no client can be created.
    fn connect(&self) -> Result<Self::Runtime, RuntimeError>;
}

/// Failures reported by a container runtime.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RuntimeError {
    /// The runtime could not be contacted.
    #[error("container runtime unreachable: {message}")]
    Unreachable {
        /// Human readable cause.
        message: String,
    },
    /// The referenced container, exec or path does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Message returned by the runtime.
        message: String,
    },
    /// The runtime answered but refused the request.
    #[error("request rejected by the container runtime: {message}")]
    Rejected {
        /// Message returned by the runtime.
        message: String,
    },
    /// An attached output stream broke.
    #[error("exec output stream failed: {message}")]
    Stream {
        /// Human readable cause.
        message: String,
    },
}
