//! Local process execution for the SSH clients.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread;

use thiserror::Error;

use crate::transport::{OutputSink, render_chunk};

/// Exit status and output of a finished client process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Standard output bytes. Empty when the terminal was inherited.
    pub stdout: Vec<u8>,
    /// Standard error bytes. Empty when the terminal was inherited.
    pub stderr: Vec<u8>,
}

/// How a runner treats the client's output streams.
#[derive(Clone, Copy)]
pub enum OutputMode<'a> {
    /// Capture both streams.
    Capture,
    /// Capture both streams and emit each stdout line to the sink as it
    /// arrives.
    Live(&'a dyn OutputSink),
    /// Connect the client to this process's terminal.
    Inherit,
}

impl std::fmt::Debug for OutputMode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => f.write_str("Capture"),
            Self::Live(_) => f.write_str("Live"),
            Self::Inherit => f.write_str("Inherit"),
        }
    }
}

/// Failures starting or supervising a client process.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RunnerError {
    /// The program could not be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Reading output or waiting for the process failed.
    #[error("failed to collect output from {program}: {message}")]
    Io {
        /// Program being supervised.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

/// Abstraction over process execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] if the program cannot be started and
    /// [`RunnerError::Io`] if its output cannot be collected.
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        mode: OutputMode<'_>,
    ) -> Result<CommandOutput, RunnerError>;

    /// Starts `program` with piped stdin, stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] if the program cannot be started.
    fn spawn(&self, program: &str, args: &[OsString]) -> Result<Child, RunnerError>;
}

/// Runner that starts real processes on the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        mode: OutputMode<'_>,
    ) -> Result<CommandOutput, RunnerError> {
        let mut command = Command::new(program);
        command.args(args);
        match mode {
            OutputMode::Capture => {
                let output = command.output().map_err(|err| spawn_error(program, &err))?;
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            OutputMode::Inherit => {
                let status = command.status().map_err(|err| spawn_error(program, &err))?;
                Ok(CommandOutput {
                    code: status.code(),
                    ..CommandOutput::default()
                })
            }
            OutputMode::Live(sink) => run_live(program, &mut command, sink),
        }
    }

    fn spawn(&self, program: &str, args: &[OsString]) -> Result<Child, RunnerError> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(program, &err))
    }
}

fn run_live(
    program: &str,
    command: &mut Command,
    sink: &dyn OutputSink,
) -> Result<CommandOutput, RunnerError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| spawn_error(program, &err))?;
    let io_error = |message: String| RunnerError::Io {
        program: program.to_owned(),
        message,
    };
    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| io_error(String::from("stdout was not piped")))?;
    let child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| io_error(String::from("stderr was not piped")))?;

    // Stderr drains on its own thread so a chatty stderr cannot block stdout.
    let (stdout, stderr) = thread::scope(|scope| {
        let stderr_reader = scope.spawn(move || drain(child_stderr));
        let stdout = stream_lines(child_stdout, sink);
        let stderr = stderr_reader
            .join()
            .unwrap_or_else(|_| Err(String::from("stderr reader panicked")));
        (stdout, stderr)
    });
    let stdout = stdout.map_err(io_error)?;
    let stderr = stderr.map_err(io_error)?;
    let status = child.wait().map_err(|err| io_error(err.to_string()))?;

    Ok(CommandOutput {
        code: status.code(),
        stdout,
        stderr,
    })
}

fn stream_lines(source: impl Read, sink: &dyn OutputSink) -> Result<Vec<u8>, String> {
    let mut reader = BufReader::new(source);
    let mut captured = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Ok(captured);
        }
        sink.emit(&render_chunk(&line));
        captured.extend_from_slice(&line);
    }
}

fn drain(mut source: ChildStderr) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    source
        .read_to_end(&mut buffer)
        .map_err(|err| err.to_string())?;
    Ok(buffer)
}

fn spawn_error(program: &str, err: &std::io::Error) -> RunnerError {
    RunnerError::Spawn {
        program: program.to_owned(),
        message: err.to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::RecordingSink;
    use rstest::rstest;

    fn sh(script: &str) -> Vec<OsString> {
        vec![OsString::from("-c"), OsString::from(script)]
    }

    #[rstest]
    fn capture_separates_streams() {
        let output = ProcessCommandRunner
            .run("sh", &sh("printf out; printf err >&2; exit 3"), OutputMode::Capture)
            .expect("run sh");

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, b"out");
        assert_eq!(output.stderr, b"err");
    }

    #[rstest]
    fn live_mode_emits_stdout_lines_in_order() {
        let sink = RecordingSink::default();

        let output = ProcessCommandRunner
            .run(
                "sh",
                &sh("for i in 1 2 3; do echo $i; echo e$i >&2; done"),
                OutputMode::Live(&sink),
            )
            .expect("run sh");

        assert_eq!(sink.lines(), vec!["1", "2", "3"]);
        assert_eq!(output.stdout, b"1\n2\n3\n");
        assert_eq!(output.stderr, b"e1\ne2\ne3\n");
        assert_eq!(output.code, Some(0));
    }

    #[rstest]
    fn missing_program_is_a_spawn_error() {
        let err = ProcessCommandRunner
            .run("/nonexistent/stevedore-ssh", &[], OutputMode::Capture)
            .expect_err("spawn should fail");

        assert!(matches!(err, RunnerError::Spawn { .. }));
    }
}
