//! Binary artifact I/O shared by checkpoints and forecast bundles.
//!
//! Artifacts are `serde` values encoded with bincode's standard config.
//! Writes go to a sibling `*.tmp` file that is then renamed over the target,
//! so readers only ever see a complete old or a complete new file.
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::mixing::errors::{MixingError, MixingResult};

/// Version stamped into every artifact; bumped on layout changes.
pub const FORMAT_VERSION: u32 = 1;

pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T) -> MixingResult<()> {
    let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| MixingError::Io { path: path.to_path_buf(), message: e.to_string() })?;
    let tmp = tmp_path(path)?;
    fs::write(&tmp, &bytes).map_err(|e| io_error(&tmp, &e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_error(path, &e)
    })
}

/// # Errors
/// - [`MixingError::CheckpointNotFound`] if nothing exists at `path`.
/// - [`MixingError::Io`] for other read failures.
/// - [`MixingError::MalformedFile`] if the bytes do not decode.
pub(crate) fn read<T: DeserializeOwned>(path: &Path) -> MixingResult<T> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MixingError::CheckpointNotFound { path: path.to_path_buf() },
        _ => io_error(path, &e),
    })?;
    let (value, _): (T, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(|e| {
            MixingError::MalformedFile { path: path.to_path_buf(), reason: e.to_string() }
        })?;
    Ok(value)
}

pub(crate) fn check_version(path: &Path, found: u32) -> MixingResult<()> {
    if found != FORMAT_VERSION {
        return Err(MixingError::MalformedFile {
            path: path.to_path_buf(),
            reason: format!("format version {found}, expected {FORMAT_VERSION}"),
        });
    }
    Ok(())
}

// ---- Helper Methods ----

fn tmp_path(path: &Path) -> MixingResult<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| MixingError::Io {
            path: path.to_path_buf(),
            message: "path has no file name".to_string(),
        })?
        .to_os_string();
    name.push(".tmp");
    Ok(path.with_file_name(name))
}

fn io_error(path: &Path, err: &io::Error) -> MixingError {
    MixingError::Io { path: path.to_path_buf(), message: err.to_string() }
}
