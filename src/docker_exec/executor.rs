//! Starts commands inside a resolved container.

use std::collections::BTreeMap;
use std::iter;

use crate::runtime::{ContainerRuntime, ExecId, ExecSpec, ExecutionTarget, OutputStream, RuntimeError};
use crate::transport::TransportError;

/// Settings for one execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecOptions {
    /// Program and arguments, never passed through a shell.
    pub command: Vec<String>,
    /// Identity the process runs as.
    pub user: String,
    /// Variables applied to this process only.
    pub environment: BTreeMap<String, String>,
    /// Allocates a pseudo-terminal. The runtime merges stderr into stdout.
    pub tty: bool,
    /// Yields output chunk by chunk rather than as one buffered chunk.
    pub stream: bool,
}

/// A started exec whose output has not been consumed yet.
pub struct RemoteProcessHandle<'a, R: ContainerRuntime + ?Sized> {
    exec_id: ExecId,
    runtime: &'a R,
    command: Vec<String>,
    output: OutputStream<'a>,
}

impl<R: ContainerRuntime + ?Sized> std::fmt::Debug for RemoteProcessHandle<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProcessHandle")
            .field("exec_id", &self.exec_id)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl<'a, R: ContainerRuntime + ?Sized> RemoteProcessHandle<'a, R> {
    /// Runtime identifier of the exec.
    #[must_use]
    pub const fn exec_id(&self) -> &ExecId {
        &self.exec_id
    }

    /// Command vector the exec was created with.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Next output chunk, or `None` once the process closed its streams.
    pub fn next_chunk(&mut self) -> Option<Result<Vec<u8>, RuntimeError>> {
        self.output.next()
    }

    /// Asks the runtime for the exit code; `None` while still running.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the exec cannot be inspected.
    pub fn poll(&self) -> Result<Option<i64>, RuntimeError> {
        self.runtime.exec_exit_code(&self.exec_id)
    }

    /// Gives up the handle, returning the command vector.
    #[must_use]
    pub fn into_command(self) -> Vec<String> {
        self.command
    }
}

/// Rejects an empty command vector.
///
/// # Errors
///
/// Returns [`TransportError::ExecutionStartFailure`] when `command` is empty.
pub fn require_command(command: &[String]) -> Result<(), TransportError> {
    if command.is_empty() {
        return Err(TransportError::ExecutionStartFailure {
            message: String::from("command vector is empty"),
        });
    }
    Ok(())
}

/// Creates and starts an exec in `target`.
///
/// # Errors
///
/// Returns [`TransportError::ExecutionStartFailure`] when the command is
/// empty or the runtime refuses to create or start the exec.
pub fn execute<'a, R: ContainerRuntime + ?Sized>(
    runtime: &'a R,
    target: &ExecutionTarget,
    options: ExecOptions,
) -> Result<RemoteProcessHandle<'a, R>, TransportError> {
    require_command(&options.command)?;

    let ExecOptions {
        command,
        user,
        environment,
        tty,
        stream,
    } = options;
    let spec = ExecSpec {
        command,
        user,
        environment,
        tty,
    };

    let exec_id = runtime
        .create_exec(target, &spec)
        .map_err(start_failure)?;
    tracing::debug!(
        container = %target.id,
        exec_id = %exec_id,
        tty,
        "created exec"
    );
    let raw = runtime.start_exec(&exec_id, tty).map_err(start_failure)?;
    let output = if stream { raw } else { buffered(raw) };

    Ok(RemoteProcessHandle {
        exec_id,
        runtime,
        command: spec.command,
        output,
    })
}

/// Collapses a chunked stream into at most one chunk holding every byte.
fn buffered(raw: OutputStream<'_>) -> OutputStream<'_> {
    Box::new(
        iter::once_with(move || -> Result<Vec<u8>, RuntimeError> {
            let mut all = Vec::new();
            for chunk in raw {
                all.extend(chunk?);
            }
            Ok(all)
        })
        .filter(|chunk| !matches!(chunk, Ok(bytes) if bytes.is_empty())),
    )
}

fn start_failure(err: RuntimeError) -> TransportError {
    TransportError::ExecutionStartFailure {
        message: err.to_string(),
    }
}
