//! Call parameters for the transport contract.

use std::collections::BTreeMap;
use std::net::IpAddr;

use camino::Utf8PathBuf;

/// Parameters for [`NodeTransport::run`](super::NodeTransport::run).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunRequest {
    /// Program and arguments, executed without shell interpretation.
    pub args: Vec<String>,
    /// Remote identity to run as.
    pub user: String,
    /// Whether output chunks are emitted to the live sink as they arrive.
    pub log_output_live: bool,
    /// Environment applied to this command only.
    pub env: BTreeMap<String, String>,
    /// Whether to allocate a pseudo-terminal and attach the local terminal.
    pub tty: bool,
    /// Private key for transports that authenticate over SSH.
    pub ssh_key_path: Option<Utf8PathBuf>,
    /// Public address of the node.
    pub address: IpAddr,
}

impl RunRequest {
    /// Creates a request with no environment, no TTY and live logging off.
    #[must_use]
    pub fn new(args: Vec<String>, user: impl Into<String>, address: IpAddr) -> Self {
        Self {
            args,
            user: user.into(),
            log_output_live: false,
            env: BTreeMap::new(),
            tty: false,
            ssh_key_path: None,
            address,
        }
    }

    /// Adds or replaces an environment variable.
    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets live output logging.
    #[must_use]
    pub const fn log_output_live(mut self, enabled: bool) -> Self {
        self.log_output_live = enabled;
        self
    }

    /// Sets pseudo-terminal allocation.
    #[must_use]
    pub const fn tty(mut self, enabled: bool) -> Self {
        self.tty = enabled;
        self
    }

    /// Sets the SSH private key.
    #[must_use]
    pub fn ssh_key_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.ssh_key_path = path;
        self
    }
}

/// Parameters for [`NodeTransport::popen`](super::NodeTransport::popen).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PopenRequest {
    /// Program and arguments.
    pub args: Vec<String>,
    /// Remote identity to run as.
    pub user: String,
    /// Environment applied to this command only.
    pub env: BTreeMap<String, String>,
    /// Private key for transports that authenticate over SSH.
    pub ssh_key_path: Option<Utf8PathBuf>,
    /// Public address of the node.
    pub address: IpAddr,
}

/// Parameters for [`NodeTransport::send_file`](super::NodeTransport::send_file).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendFileRequest {
    /// File on the local host.
    pub local_path: Utf8PathBuf,
    /// Destination on the node. Only its basename and parent are used; the
    /// local directory structure is discarded.
    pub remote_path: Utf8PathBuf,
    /// Remote identity the file is sent as.
    pub user: String,
    /// Private key for transports that authenticate over SSH.
    pub ssh_key_path: Option<Utf8PathBuf>,
    /// Public address of the node.
    pub address: IpAddr,
}
