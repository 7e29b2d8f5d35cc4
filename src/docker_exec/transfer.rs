//! Delivers packaged files into a container.

use camino::Utf8Path;

use crate::runtime::{ContainerRuntime, ExecutionTarget, RuntimeError};
use crate::transport::TransportError;

use super::archive::PackagedFile;

/// Extracts `packaged` into its destination directory inside `target`.
///
/// `user` is recorded but not applied: extracted files keep the ownership
/// stored in the archive.
///
/// # Errors
///
/// Returns [`TransportError::RemoteWriteFailure`] when the container rejects
/// the archive or the destination is missing, and
/// [`TransportError::TargetUnreachable`] when the runtime cannot be reached.
pub fn deliver<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    target: &ExecutionTarget,
    packaged: PackagedFile,
    remote_path: &Utf8Path,
    user: &str,
) -> Result<(), TransportError> {
    tracing::debug!(
        container = %target.id,
        remote_path = %remote_path,
        user,
        "delivering file; ownership is not changed to the requested user"
    );
    let PackagedFile {
        payload,
        destination,
    } = packaged;
    runtime
        .put_archive(target, &destination, payload.into_bytes())
        .map_err(|err| match err {
            RuntimeError::NotFound { message } | RuntimeError::Rejected { message } => {
                TransportError::RemoteWriteFailure {
                    path: remote_path.to_path_buf(),
                    message,
                }
            }
            RuntimeError::Unreachable { .. } | RuntimeError::Stream { .. } => {
                TransportError::TargetUnreachable {
                    message: err.to_string(),
                }
            }
        })
}
