//! Turns a finished exec into a [`CommandResult`].

use std::io::Write;

use crate::runtime::ContainerRuntime;
use crate::transport::{CommandResult, OutputSink, TransportError, render_chunk};

use super::executor::RemoteProcessHandle;

/// Drains `handle`, then reads the exit status.
///
/// Every chunk is emitted to `sink` as it arrives when `log_output_live` is
/// set. Chunks go to `terminal` when one is attached, otherwise they are
/// appended to the result's stdout. Stderr is always empty because the exec
/// output stream does not separate the two.
///
/// # Errors
///
/// Returns [`TransportError::NonZeroExit`] for a failing command,
/// [`TransportError::OutputStream`] when reading output or writing to the
/// terminal fails, and [`TransportError::ExitStatusUnavailable`] when the
/// runtime reports no usable exit code.
pub fn finalize<R, S>(
    mut handle: RemoteProcessHandle<'_, R>,
    sink: &S,
    log_output_live: bool,
    mut terminal: Option<&mut dyn Write>,
) -> Result<CommandResult, TransportError>
where
    R: ContainerRuntime + ?Sized,
    S: OutputSink + ?Sized,
{
    let mut stdout = Vec::new();
    while let Some(chunk) = handle.next_chunk() {
        let bytes = chunk.map_err(|err| TransportError::OutputStream {
            message: err.to_string(),
        })?;
        if log_output_live {
            sink.emit(&render_chunk(&bytes));
        }
        match terminal.as_deref_mut() {
            Some(out) => out
                .write_all(&bytes)
                .and_then(|()| out.flush())
                .map_err(|err| TransportError::OutputStream {
                    message: format!("failed to write to terminal: {err}"),
                })?,
            None => stdout.extend_from_slice(&bytes),
        }
    }

    let status = handle
        .poll()
        .map_err(|err| TransportError::ExitStatusUnavailable {
            message: err.to_string(),
        })?;
    let exit_code = match status {
        Some(code) => i32::try_from(code).map_err(|_| TransportError::ExitStatusUnavailable {
            message: format!("exit code {code} is out of range"),
        })?,
        None => {
            return Err(TransportError::ExitStatusUnavailable {
                message: format!("exec {} reported no exit code", handle.exec_id()),
            });
        }
    };

    let result = CommandResult::new(handle.into_command(), exit_code, stdout, Vec::new());
    if result.is_success() {
        return Ok(result);
    }
    if !log_output_live {
        tracing::warn!(
            command = %result.command_line(),
            exit_code,
            "remote command failed"
        );
    }
    Err(TransportError::NonZeroExit(Box::new(result)))
}
