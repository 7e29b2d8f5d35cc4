//! Node transport that runs commands inside containers through the runtime's
//! exec API.
//!
//! Every call connects a fresh runtime client, resolves the node's container
//! from its address and then executes, translates or delivers. Stdout and
//! stderr arrive on one merged stream, so results always carry an empty
//! stderr. Piped processes are not available on this transport.

use std::io;
use std::net::IpAddr;

use crate::config::{ConfigError, DockerConfig};
use crate::runtime::{
    ContainerRuntime, DockerConnector, ExecutionTarget, RuntimeConnector, RuntimeError,
};
use crate::transport::{
    Capabilities, Capability, CommandResult, LocateError, NodeTransport, OutputSink,
    PipedProcess, PopenRequest, RunRequest, SendFileRequest, TracingSink, TransportError,
};

pub mod archive;
pub mod executor;
pub mod locator;
pub mod transfer;
pub mod translate;

pub use archive::{ArchivePayload, PackagedFile, package_file};
pub use executor::{ExecOptions, RemoteProcessHandle, execute};
pub use locator::resolve;
pub use transfer::deliver;
pub use translate::finalize;

/// Name reported in [`TransportError::Unsupported`].
pub const TRANSPORT_NAME: &str = "docker-exec";

/// Container-exec implementation of [`NodeTransport`].
#[derive(Clone, Debug)]
pub struct DockerExecTransport<C, S = TracingSink> {
    connector: C,
    sink: S,
}

impl DockerExecTransport<DockerConnector> {
    /// Builds a transport talking to the daemon described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails validation.
    pub fn from_config(config: DockerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(DockerConnector::new(config)))
    }
}

impl<C: RuntimeConnector> DockerExecTransport<C> {
    /// Creates a transport that logs live output through `tracing`.
    #[must_use]
    pub const fn new(connector: C) -> Self {
        Self {
            connector,
            sink: TracingSink,
        }
    }
}

impl<C, S> DockerExecTransport<C, S> {
    /// Replaces the live output sink.
    #[must_use]
    pub fn with_sink<T: OutputSink>(self, sink: T) -> DockerExecTransport<C, T> {
        DockerExecTransport {
            connector: self.connector,
            sink,
        }
    }

    /// Connector used for every call.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: RuntimeConnector, S: OutputSink> NodeTransport for DockerExecTransport<C, S> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL.without(Capability::Popen)
    }

    fn run(&self, request: &RunRequest) -> Result<CommandResult, TransportError> {
        executor::require_command(&request.args)?;
        let runtime =
            self.connector
                .connect()
                .map_err(|err| TransportError::ExecutionStartFailure {
                    message: err.to_string(),
                })?;
        let target = locate(&runtime, request.address, |message| {
            TransportError::ExecutionStartFailure { message }
        })?;
        let handle = execute(
            &runtime,
            &target,
            ExecOptions {
                command: request.args.clone(),
                user: request.user.clone(),
                environment: request.env.clone(),
                tty: request.tty,
                stream: true,
            },
        )?;

        if request.tty {
            let mut terminal = io::stdout().lock();
            finalize(handle, &self.sink, request.log_output_live, Some(&mut terminal))
        } else {
            finalize(handle, &self.sink, request.log_output_live, None)
        }
    }

    fn popen(&self, _request: &PopenRequest) -> Result<PipedProcess, TransportError> {
        Err(TransportError::Unsupported {
            transport: TRANSPORT_NAME,
            operation: Capability::Popen,
        })
    }

    fn send_file(&self, request: &SendFileRequest) -> Result<(), TransportError> {
        let packaged = package_file(&request.local_path, &request.remote_path)?;
        let runtime =
            self.connector
                .connect()
                .map_err(|err| TransportError::TargetUnreachable {
                    message: err.to_string(),
                })?;
        let target = locate(&runtime, request.address, |message| {
            TransportError::TargetUnreachable { message }
        })?;
        deliver(
            &runtime,
            &target,
            packaged,
            &request.remote_path,
            &request.user,
        )
    }
}

/// Resolves the target, reporting a daemon that fails while listing its
/// inventory through `unreachable` rather than as a lookup failure.
///
/// `bollard` connects lazily, so the inventory query is the first request
/// that reaches the daemon.
fn locate<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    address: IpAddr,
    unreachable: impl FnOnce(String) -> TransportError,
) -> Result<ExecutionTarget, TransportError> {
    match resolve(runtime, address) {
        Ok(target) => Ok(target),
        Err(LocateError::Inventory(
            err @ (RuntimeError::Unreachable { .. } | RuntimeError::Stream { .. }),
        )) => Err(unreachable(err.to_string())),
        Err(other) => Err(other.into()),
    }
}
