//! Command execution and file transfer for nodes of multi-node test clusters.
//!
//! Harness code talks to every node through [`NodeTransport`]: run a command
//! to completion, open a pipe to a live process, or copy a file. Two
//! transports are provided. [`DockerExecTransport`] runs commands inside the
//! node's container through the Docker exec API and copies files as tar
//! archives; [`SshTransport`] drives the system `ssh` and `scp` clients.

pub mod config;
pub mod docker_exec;
pub mod local_file;
pub mod node;
pub mod runtime;
pub mod ssh;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;
pub mod transport;

pub use config::{ConfigError, DockerConfig};
pub use docker_exec::DockerExecTransport;
pub use node::{Node, NodeRun, Role};
pub use runtime::{ContainerRuntime, DockerConnector, DockerEngine, RuntimeConnector, RuntimeError};
pub use ssh::{ProcessCommandRunner, SshConfig, SshTransport};
pub use transport::{
    Capabilities, Capability, CommandResult, LocateError, NodeTransport, PipedProcess,
    PopenRequest, RunRequest, SendFileRequest, TransportError,
};
