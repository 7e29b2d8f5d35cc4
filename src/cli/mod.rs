//! Command-line interface definitions for the `stevedore` binary.
//!
//! This module holds only clap parser structures so both the binary and the
//! build script can use them; the build script renders the manual page from
//! them.

use std::net::IpAddr;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI for the `stevedore` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stevedore",
    about = "Run commands on and copy files to cluster nodes",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log transport diagnostics at debug level.
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `stevedore`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run a command on a node and exit with its status.
    #[command(name = "run", about = "Run a command on a node and exit with its status")]
    Run(RunCommand),
    /// Copy a local file onto a node.
    #[command(name = "send-file", about = "Copy a local file onto a node")]
    SendFile(SendFileCommand),
}

/// How the CLI reaches the node.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum TransportKind {
    /// Execute inside the node's container through the Docker exec API.
    #[default]
    DockerExec,
    /// Use the system `ssh` and `scp` clients.
    Ssh,
}

/// Node addressing shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct NodeArgs {
    /// Public address of the node.
    #[arg(long, value_name = "IP")]
    pub(crate) address: IpAddr,
    /// Remote user.
    #[arg(long, default_value = "root")]
    pub(crate) user: String,
    /// Mechanism used to reach the node.
    #[arg(long, value_enum, default_value_t = TransportKind::DockerExec)]
    pub(crate) transport: TransportKind,
    /// Private key for the SSH transport.
    #[arg(long, value_name = "PATH")]
    pub(crate) ssh_key: Option<String>,
}

/// Arguments for the `stevedore run` subcommand.
#[derive(Debug, Args)]
pub(crate) struct RunCommand {
    #[command(flatten)]
    pub(crate) node: NodeArgs,
    /// Environment variable for the remote command, as KEY=VALUE. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub(crate) env: Vec<(String, String)>,
    /// Allocate a pseudo-terminal and attach this terminal to it.
    #[arg(long)]
    pub(crate) tty: bool,
    /// Log each chunk of remote output to stderr as it arrives.
    #[arg(long)]
    pub(crate) log_output_live: bool,
    /// Command to execute on the node (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for the `stevedore send-file` subcommand.
#[derive(Debug, Args)]
pub(crate) struct SendFileCommand {
    #[command(flatten)]
    pub(crate) node: NodeArgs,
    /// File on this machine.
    #[arg(value_name = "LOCAL")]
    pub(crate) local: String,
    /// Destination path on the node.
    #[arg(value_name = "REMOTE")]
    pub(crate) remote: String,
}

/// Splits `KEY=VALUE` at the first `=`.
pub(crate) fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
