//! The node transport contract.
//!
//! Cluster tooling talks to nodes exclusively through [`NodeTransport`]. Each
//! concrete transport (container exec, SSH) declares the operations it
//! implements through [`Capabilities`]; calling an operation outside that set
//! yields [`TransportError::Unsupported`] rather than a panic.

use std::process::Child;

mod capability;
mod error;
mod request;
mod result;
mod sink;

pub use capability::{Capabilities, Capability};
pub use error::{LocateError, TransportError};
pub use request::{PopenRequest, RunRequest, SendFileRequest};
pub use result::CommandResult;
pub use sink::{OutputSink, TracingSink, render_chunk};

/// Uniform interface for running commands and copying files onto a node.
///
/// Implementations hold no per-node state: every call resolves its target
/// from the supplied address, so a transport can be shared between threads
/// operating on different nodes.
pub trait NodeTransport {
    /// Operations this transport implements.
    fn capabilities(&self) -> Capabilities;

    /// Runs a command to completion.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NonZeroExit`] when the command ran and
    /// failed, or another [`TransportError`] when it could not be run.
    fn run(&self, request: &RunRequest) -> Result<CommandResult, TransportError>;

    /// Starts a command and hands the live process to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unsupported`] on transports without
    /// [`Capability::Popen`], or a start failure otherwise.
    fn popen(&self, request: &PopenRequest) -> Result<PipedProcess, TransportError>;

    /// Copies a local file onto the node.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::LocalReadFailure`],
    /// [`TransportError::TargetUnreachable`] or
    /// [`TransportError::RemoteWriteFailure`] depending on where the copy
    /// failed.
    fn send_file(&self, request: &SendFileRequest) -> Result<(), TransportError>;
}

impl<T: NodeTransport + ?Sized> NodeTransport for Box<T> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn run(&self, request: &RunRequest) -> Result<CommandResult, TransportError> {
        (**self).run(request)
    }

    fn popen(&self, request: &PopenRequest) -> Result<PipedProcess, TransportError> {
        (**self).popen(request)
    }

    fn send_file(&self, request: &SendFileRequest) -> Result<(), TransportError> {
        (**self).send_file(request)
    }
}

/// A remote process whose pipes now belong to the caller.
#[derive(Debug)]
pub struct PipedProcess {
    args: Vec<String>,
    child: Child,
}

impl PipedProcess {
    /// Wraps a spawned local client process driving the remote command.
    #[must_use]
    pub const fn new(args: Vec<String>, child: Child) -> Self {
        Self { args, child }
    }

    /// Command vector requested on the node.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Mutable access to the pipes and process control.
    pub const fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Releases the underlying process.
    #[must_use]
    pub fn into_child(self) -> Child {
        self.child
    }

    /// Waits for the process and collects any output still in its pipes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NonZeroExit`] for a failing command and
    /// [`TransportError::ExitStatusUnavailable`] when the process was
    /// terminated by a signal or could not be waited on.
    pub fn wait(self) -> Result<CommandResult, TransportError> {
        let output =
            self.child
                .wait_with_output()
                .map_err(|err| TransportError::ExitStatusUnavailable {
                    message: err.to_string(),
                })?;
        let Some(code) = output.status.code() else {
            return Err(TransportError::ExitStatusUnavailable {
                message: String::from("process terminated by a signal"),
            });
        };
        let result = CommandResult::new(self.args, code, output.stdout, output.stderr);
        if result.is_success() {
            Ok(result)
        } else {
            Err(TransportError::NonZeroExit(Box::new(result)))
        }
    }
}
