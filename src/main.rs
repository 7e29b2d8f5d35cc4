//! Binary entry point for the stevedore CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use stevedore::{
    CommandResult, ConfigError, DockerConfig, DockerExecTransport, NodeTransport, RunRequest,
    SendFileRequest, SshConfig, SshTransport, TransportError,
};

mod cli;

use cli::{Cli, Command, NodeArgs, RunCommand, SendFileCommand, TransportKind};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to write command output: {0}")]
    Output(String),
}

/// Target `TracingSink` logs remote output under.
const OUTPUT_TARGET: &str = "stevedore::output";

fn main() {
    let cli = Cli::parse();
    let live_output = matches!(&cli.command, Command::Run(args) if args.log_output_live);
    init_tracing(env_filter(cli.verbose, live_output));
    let exit_code = match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

/// Builds the log filter. Live remote output is logged at debug level, so
/// its target is raised whenever live logging was requested.
fn env_filter(verbose: bool, live_output: bool) -> EnvFilter {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    if !live_output {
        return filter;
    }
    match format!("{OUTPUT_TARGET}=debug").parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn init_tracing(filter: EnvFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn dispatch(command: Command) -> Result<i32, CliError> {
    match command {
        Command::Run(args) => {
            let transport = build_transport(args.node.transport)?;
            let request = run_request(args);
            execute_run(transport.as_ref(), &request, io::stdout(), io::stderr())
        }
        Command::SendFile(args) => {
            let transport = build_transport(args.node.transport)?;
            transport.send_file(&send_file_request(args))?;
            Ok(0)
        }
    }
}

fn build_transport(kind: TransportKind) -> Result<Box<dyn NodeTransport>, CliError> {
    let transport: Box<dyn NodeTransport> = match kind {
        TransportKind::DockerExec => Box::new(DockerExecTransport::from_config(
            DockerConfig::load_without_cli_args()?,
        )?),
        TransportKind::Ssh => Box::new(SshTransport::with_process_runner(
            SshConfig::load_without_cli_args()?,
        )?),
    };
    Ok(transport)
}

fn key_path(node: &NodeArgs) -> Option<Utf8PathBuf> {
    node.ssh_key.as_deref().map(Utf8PathBuf::from)
}

fn run_request(args: RunCommand) -> RunRequest {
    RunRequest {
        ssh_key_path: key_path(&args.node),
        args: args.command,
        user: args.node.user,
        log_output_live: args.log_output_live,
        env: args.env.into_iter().collect(),
        tty: args.tty,
        address: args.node.address,
    }
}

fn send_file_request(args: SendFileCommand) -> SendFileRequest {
    SendFileRequest {
        ssh_key_path: key_path(&args.node),
        local_path: Utf8PathBuf::from(args.local),
        remote_path: Utf8PathBuf::from(args.remote),
        user: args.node.user,
        address: args.node.address,
    }
}

/// Runs `request`, copies the captured streams to `out` and `err`, and maps
/// the remote status onto this process's exit code.
fn execute_run<T: NodeTransport + ?Sized>(
    transport: &T,
    request: &RunRequest,
    out: impl Write,
    err: impl Write,
) -> Result<i32, CliError> {
    match transport.run(request) {
        Ok(result) => {
            write_output(&result, out, err)?;
            Ok(0)
        }
        Err(TransportError::NonZeroExit(result)) => {
            write_output(&result, out, err)?;
            Ok(result.exit_code())
        }
        Err(other) => Err(other.into()),
    }
}

fn write_output(
    result: &CommandResult,
    mut out: impl Write,
    mut err: impl Write,
) -> Result<(), CliError> {
    let to_cli_error = |error: io::Error| CliError::Output(error.to_string());
    out.write_all(result.stdout()).map_err(to_cli_error)?;
    out.flush().map_err(to_cli_error)?;
    err.write_all(result.stderr()).map_err(to_cli_error)?;
    err.flush().map_err(to_cli_error)
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "stevedore: {err}").ok();
}
