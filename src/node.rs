//! Cluster nodes as seen by harness code.
//!
//! A [`Node`] carries the addressing and login defaults of one machine and
//! turns high-level calls into transport requests. It never owns a
//! transport; callers pass the one their backend uses.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use camino::Utf8PathBuf;

use crate::transport::{
    CommandResult, NodeTransport, PipedProcess, PopenRequest, RunRequest, SendFileRequest,
    TransportError,
};

/// Shell used when a command is run with [`NodeRun::shell`].
pub const SHELL: &str = "/bin/sh";

/// Part a node plays in the cluster.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Role {
    /// Control-plane node.
    Master,
    /// Private worker node.
    Agent,
    /// Worker node reachable from outside the cluster.
    PublicAgent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Master => "master",
            Self::Agent => "agent",
            Self::PublicAgent => "public_agent",
        })
    }
}

/// One machine of a cluster. Identity is the public address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    /// Address used to reach the node from the harness.
    pub public_address: IpAddr,
    /// Address used by other nodes inside the cluster.
    pub private_address: IpAddr,
    /// Part the node plays.
    pub role: Role,
    /// Login used when a call does not name one.
    pub default_user: String,
    /// Private key for transports that authenticate over SSH.
    pub ssh_key_path: Option<Utf8PathBuf>,
}

/// A command to run on a [`Node`], with per-call overrides.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeRun {
    args: Vec<String>,
    user: Option<String>,
    env: BTreeMap<String, String>,
    log_output_live: bool,
    tty: bool,
    shell: bool,
}

impl NodeRun {
    /// Runs `args` with the node's defaults.
    #[must_use]
    pub fn new<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Overrides the login.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Adds or replaces an environment variable.
    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Streams output to the live sink.
    #[must_use]
    pub const fn log_output_live(mut self, enabled: bool) -> Self {
        self.log_output_live = enabled;
        self
    }

    /// Allocates a pseudo-terminal.
    #[must_use]
    pub const fn tty(mut self, enabled: bool) -> Self {
        self.tty = enabled;
        self
    }

    /// Joins the arguments with spaces and hands them to `/bin/sh -c`, so
    /// pipes, globs and variable expansion work.
    #[must_use]
    pub const fn shell(mut self, enabled: bool) -> Self {
        self.shell = enabled;
        self
    }

    fn command(&self) -> Vec<String> {
        if self.shell {
            vec![
                String::from(SHELL),
                String::from("-c"),
                self.args.join(" "),
            ]
        } else {
            self.args.clone()
        }
    }
}

impl Node {
    /// Creates a node with no SSH key.
    #[must_use]
    pub fn new(
        public_address: IpAddr,
        private_address: IpAddr,
        role: Role,
        default_user: impl Into<String>,
    ) -> Self {
        Self {
            public_address,
            private_address,
            role,
            default_user: default_user.into(),
            ssh_key_path: None,
        }
    }

    /// Sets the SSH private key.
    #[must_use]
    pub fn with_ssh_key(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.ssh_key_path = Some(path.into());
        self
    }

    /// Builds the transport request for `run`.
    #[must_use]
    pub fn run_request(&self, run: &NodeRun) -> RunRequest {
        RunRequest {
            args: run.command(),
            user: self.user_for(run.user.as_deref()),
            log_output_live: run.log_output_live,
            env: run.env.clone(),
            tty: run.tty,
            ssh_key_path: self.ssh_key_path.clone(),
            address: self.public_address,
        }
    }

    /// Runs a command on this node.
    ///
    /// # Errors
    ///
    /// Propagates every [`TransportError`] from `transport`.
    pub fn run<T: NodeTransport + ?Sized>(
        &self,
        transport: &T,
        run: &NodeRun,
    ) -> Result<CommandResult, TransportError> {
        transport.run(&self.run_request(run))
    }

    /// Starts a command on this node and returns its pipes.
    ///
    /// # Errors
    ///
    /// Propagates every [`TransportError`] from `transport`, including
    /// [`TransportError::Unsupported`].
    pub fn popen<T: NodeTransport + ?Sized>(
        &self,
        transport: &T,
        run: &NodeRun,
    ) -> Result<PipedProcess, TransportError> {
        transport.popen(&PopenRequest {
            args: run.command(),
            user: self.user_for(run.user.as_deref()),
            env: run.env.clone(),
            ssh_key_path: self.ssh_key_path.clone(),
            address: self.public_address,
        })
    }

    /// Copies a local file onto this node.
    ///
    /// # Errors
    ///
    /// Propagates every [`TransportError`] from `transport`.
    pub fn send_file<T: NodeTransport + ?Sized>(
        &self,
        transport: &T,
        local_path: impl Into<Utf8PathBuf>,
        remote_path: impl Into<Utf8PathBuf>,
        user: Option<&str>,
    ) -> Result<(), TransportError> {
        transport.send_file(&SendFileRequest {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            user: self.user_for(user),
            ssh_key_path: self.ssh_key_path.clone(),
            address: self.public_address,
        })
    }

    fn user_for(&self, user: Option<&str>) -> String {
        user.unwrap_or(&self.default_user).to_owned()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.role, self.public_address, self.private_address
        )
    }
}
