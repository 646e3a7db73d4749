//! Storage backend for a store root.
//!
//! This module owns every filesystem touch made by the local store:
//!
//! - Resolving a user-facing endpoint string into a [`StorageLocation`].
//! - Atomic write-then-rename for mutable pointers (the `CURRENT` file).
//! - Create-new writes for immutable objects (commit files, Parquet segments),
//!   which double as the optimistic concurrency guard of the commit protocol.
//! - Whole-file reads.
//!
//! Path conventions under the root live in [`layout`]. Only the local
//! filesystem is supported, but callers work with [`StorageLocation`] so that
//! an object-store backend can be added without touching the log or catalog
//! logic.

pub mod error;
pub mod layout;

use std::{
    io,
    path::{Path, PathBuf},
};

use snafu::IntoError;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

pub use error::StorageError;
pub(crate) use error::{AlreadyExistsSnafu, InvalidLocationSnafu, NotFoundSnafu, OtherIoSnafu};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

const FILE_SCHEME: &str = "file://";

/// Where a store keeps its files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// A store rooted at a local filesystem directory.
    Local(PathBuf),
}

impl StorageLocation {
    /// Creates a new `StorageLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        StorageLocation::Local(root.into())
    }

    /// Parse an endpoint string.
    ///
    /// Accepts a bare path or a `file://` URL. Any other scheme is rejected
    /// with [`StorageError::InvalidLocation`].
    pub fn parse(spec: &str) -> StorageResult<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return InvalidLocationSnafu {
                spec,
                reason: "endpoint is empty",
            }
            .fail();
        }

        if let Some(path) = trimmed.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return InvalidLocationSnafu {
                    spec,
                    reason: "file:// endpoint has no path",
                }
                .fail();
            }
            return Ok(StorageLocation::local(path));
        }

        if let Some((scheme, _)) = trimmed.split_once("://") {
            return InvalidLocationSnafu {
                spec,
                reason: format!("unsupported scheme '{scheme}'"),
            }
            .fail();
        }

        Ok(StorageLocation::local(trimmed))
    }

    /// Check that the root exists and is a directory.
    pub async fn ensure_root_dir(&self) -> StorageResult<()> {
        match self {
            StorageLocation::Local(root) => {
                let path = root.display().to_string();
                let meta = fs::metadata(root).await.map_err(|e| io_error(&path, e))?;
                if !meta.is_dir() {
                    let source = io::Error::other("not a directory");
                    return Err(NotFoundSnafu { path }.into_error(source));
                }
                Ok(())
            }
        }
    }

    /// Create the root directory (and parents) if it does not exist yet.
    pub async fn create_root_dir(&self) -> StorageResult<()> {
        match self {
            StorageLocation::Local(root) => fs::create_dir_all(root)
                .await
                .map_err(|e| io_error(root.display().to_string(), e)),
        }
    }
}

/// Map an I/O error on `path` to the matching [`StorageError`] variant.
fn io_error(path: impl Into<String>, source: io::Error) -> StorageError {
    let path = path.into();
    match source.kind() {
        io::ErrorKind::NotFound => NotFoundSnafu { path }.into_error(source),
        io::ErrorKind::AlreadyExists => AlreadyExistsSnafu { path }.into_error(source),
        _ => OtherIoSnafu { path }.into_error(source),
    }
}

/// Join a location with a relative path into an absolute local path.
pub(crate) fn join_local(location: &StorageLocation, rel: &Path) -> PathBuf {
    match location {
        StorageLocation::Local(root) => root.join(rel),
    }
}

async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent.display().to_string(), e))?;
    }
    Ok(())
}

/// Removes a temporary file on drop unless disarmed.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best effort: we are already on an error path.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Write `contents` to `rel_path` inside `location` using an atomic write.
///
/// The payload goes to a temporary sibling file, is synced, and is renamed
/// over the target, so readers see either the old or the new contents.
pub async fn write_atomic(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            create_parent_dir(&abs).await?;

            let tmp_path = abs.with_extension("tmp");
            let mut guard = TempFileGuard::new(tmp_path.clone());
            let tmp_str = tmp_path.display().to_string();

            {
                let mut file = fs::File::create(&tmp_path)
                    .await
                    .map_err(|e| io_error(&tmp_str, e))?;

                file.write_all(contents)
                    .await
                    .map_err(|e| io_error(&tmp_str, e))?;

                file.sync_all()
                    .await
                    .map_err(|e| io_error(&tmp_str, e))?;
            }

            fs::rename(&tmp_path, &abs)
                .await
                .map_err(|e| io_error(abs.display().to_string(), e))?;

            guard.disarm();
            Ok(())
        }
    }
}

/// Create a *new* file at `rel_path` and write `contents`, failing with
/// [`StorageError::AlreadyExists`] if the file already exists.
///
/// Used for commit files and segment files, which are immutable once written.
pub async fn write_new(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            create_parent_dir(&abs).await?;

            let path_str = abs.display().to_string();

            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&abs)
                .await
                .map_err(|e| io_error(&path_str, e))?;

            file.write_all(contents)
                .await
                .map_err(|e| io_error(&path_str, e))?;

            file.sync_all()
                .await
                .map_err(|e| io_error(&path_str, e))?;

            Ok(())
        }
    }
}

/// Read the file at `rel_path` as UTF-8 text.
///
/// A missing file is reported as [`StorageError::NotFound`] so callers can
/// treat absence as a state rather than a failure.
pub async fn read_to_string(location: &StorageLocation, rel_path: &Path) -> StorageResult<String> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            fs::read_to_string(&abs)
                .await
                .map_err(|e| io_error(abs.display().to_string(), e))
        }
    }
}
