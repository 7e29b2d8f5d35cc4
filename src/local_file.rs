//! Reads local files through `cap-std` ambient directories.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

/// Permission bits used when the platform does not expose Unix modes.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Contents and permission bits of a local file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalFile {
    /// Raw file contents.
    pub contents: Vec<u8>,
    /// Unix permission bits, or [`DEFAULT_FILE_MODE`].
    pub mode: u32,
}

/// Reads `path` fully, returning its bytes and permission bits.
///
/// Relative paths resolve against the current working directory.
///
/// # Errors
///
/// Returns the operating system error string when the file cannot be opened
/// or read.
pub fn read_local_file(path: &Utf8Path) -> Result<LocalFile, String> {
    let (dir, file_name) = open_parent(path)?;
    let metadata = dir.metadata(file_name).map_err(|err| err.to_string())?;
    if metadata.is_dir() {
        return Err(format!("{path} is a directory"));
    }
    let contents = dir.read(file_name).map_err(|err| err.to_string())?;
    Ok(LocalFile {
        contents,
        mode: mode_of(&metadata),
    })
}

/// Checks that `path` names a regular file that can be opened for reading.
///
/// # Errors
///
/// Returns the operating system error string when the file cannot be opened
/// or is a directory.
pub fn ensure_readable(path: &Utf8Path) -> Result<(), String> {
    let (dir, file_name) = open_parent(path)?;
    let file = dir.open(file_name).map_err(|err| err.to_string())?;
    let metadata = file.metadata().map_err(|err| err.to_string())?;
    if metadata.is_dir() {
        return Err(format!("{path} is a directory"));
    }
    Ok(())
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("path has no file name: {path}"))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| err.to_string())?;
    Ok((dir, file_name))
}

#[cfg(unix)]
fn mode_of(metadata: &cap_std::fs::Metadata) -> u32 {
    use cap_std::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_metadata: &cap_std::fs::Metadata) -> u32 {
    DEFAULT_FILE_MODE
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("temp path should be UTF-8")
    }

    #[rstest]
    fn reads_bytes_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.bin");
        let bytes = vec![0_u8, 159, 146, 150, b'\n'];
        std::fs::write(&path, &bytes).expect("write payload");

        let file = read_local_file(&utf8(&path)).expect("read payload");

        assert_eq!(file.contents, bytes);
    }

    #[cfg(unix)]
    #[rstest]
    fn preserves_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.sh");
        std::fs::write(&path, b"#!/bin/sh\n").expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o750))
            .expect("chmod script");

        let file = read_local_file(&utf8(&path)).expect("read script");

        assert_eq!(file.mode, 0o750);
    }

    #[rstest]
    fn missing_file_reports_os_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = utf8(&dir.path().join("absent.txt"));

        let err = read_local_file(&path).expect_err("missing file should fail");

        assert!(!err.is_empty());
    }

    #[rstest]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("nested")).expect("mkdir");

        let result = read_local_file(&utf8(&dir.path().join("nested")));

        assert!(result.is_err());
        assert!(ensure_readable(&utf8(&dir.path().join("nested"))).is_err());
    }

    #[rstest]
    fn readable_file_passes_check() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("present.txt");
        std::fs::write(&path, b"x").expect("write");

        assert!(ensure_readable(&utf8(&path)).is_ok());
    }
}
