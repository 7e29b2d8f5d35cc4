//! Single-entry tar archives for file delivery.

use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use tar::{Builder, EntryType, Header};

use crate::local_file::read_local_file;
use crate::transport::TransportError;

/// In-memory ustar archive holding exactly one regular file at its root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchivePayload {
    bytes: Vec<u8>,
    entry_name: String,
}

impl ArchivePayload {
    /// Builds an archive with one entry named `entry_name`.
    ///
    /// # Errors
    ///
    /// Returns the `tar` error string when the entry cannot be written.
    pub fn single_file(entry_name: &str, contents: &[u8], mode: u32) -> Result<Self, String> {
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_size(u64::try_from(contents.len()).map_err(|err| err.to_string())?);
        header.set_mode(mode);
        header.set_mtime(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs()),
        );

        let mut builder = Builder::new(Vec::new());
        builder
            .append_data(&mut header, entry_name, contents)
            .map_err(|err| err.to_string())?;
        let bytes = builder.into_inner().map_err(|err| err.to_string())?;
        Ok(Self {
            bytes,
            entry_name: entry_name.to_owned(),
        })
    }

    /// Name of the only entry.
    #[must_use]
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Encoded archive.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the payload, returning the encoded archive.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// An archive paired with the directory it must be extracted into.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackagedFile {
    /// Archive whose entry is the remote basename.
    pub payload: ArchivePayload,
    /// Parent directory of the remote path.
    pub destination: Utf8PathBuf,
}

/// Reads `local_path` and packages it for delivery to `remote_path`.
///
/// Only the basename of `remote_path` is kept inside the archive; the local
/// directory structure is discarded.
///
/// # Errors
///
/// Returns [`TransportError::RemoteWriteFailure`] when `remote_path` has no
/// basename or parent, and [`TransportError::LocalReadFailure`] when the
/// local file cannot be read.
pub fn package_file(
    local_path: &Utf8Path,
    remote_path: &Utf8Path,
) -> Result<PackagedFile, TransportError> {
    let (destination, entry_name) = split_remote(remote_path)?;
    let local = read_local_file(local_path).map_err(|message| TransportError::LocalReadFailure {
        path: local_path.to_path_buf(),
        message,
    })?;
    let payload = ArchivePayload::single_file(entry_name, &local.contents, local.mode).map_err(
        |message| TransportError::LocalReadFailure {
            path: local_path.to_path_buf(),
            message,
        },
    )?;
    Ok(PackagedFile {
        payload,
        destination: destination.to_path_buf(),
    })
}

fn split_remote(remote_path: &Utf8Path) -> Result<(&Utf8Path, &str), TransportError> {
    let reject = |message: &str| TransportError::RemoteWriteFailure {
        path: remote_path.to_path_buf(),
        message: message.to_owned(),
    };
    let entry_name = remote_path
        .file_name()
        .ok_or_else(|| reject("remote path has no file name"))?;
    let parent = remote_path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .ok_or_else(|| reject("remote path has no parent directory"))?;
    Ok((parent, entry_name))
}
