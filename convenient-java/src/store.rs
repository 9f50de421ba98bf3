//! Atomic JSON persistence shared by the build and test ledgers
//!
//! A ledger is never updated in place: the new contents are written to a
//! temporary sibling, flushed to disk and renamed over the old file, so a
//! crash leaves either the previous or the new ledger, never a mix.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ledger persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File exists but could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Ledger path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// File is not a valid ledger
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// Ledger path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// New contents could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Ledger path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Value could not be serialized
    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Load a JSON document.
///
/// A missing file is `Ok(None)`; an unreadable or malformed one is an error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut data = serde_json::to_vec_pretty(value).map_err(StoreError::Serialize)?;
    data.push(b'\n');

    atomic_write(path, &data).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Write-fsync-rename, then fsync the parent directory.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    // Best effort: not every filesystem supports syncing directories
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}
