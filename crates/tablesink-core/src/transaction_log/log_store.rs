//! Async helpers for persisting and reading the catalog log.
//!
//! This module owns every on-disk interaction with `_tablesink_log/`:
//! - Reading the `CURRENT` pointer, where a missing file means version `0`
//!   (empty store).
//! - Writing zero-padded commit files with create-new semantics so each
//!   version is created exactly once.
//! - Mapping storage failures into [`CommitError`] so callers can tell
//!   conflicts, storage errors and corrupt state apart.
use chrono::Utc;
use snafu::{Backtrace, prelude::*};

use crate::{
    storage::{self, StorageError, StorageLocation, layout},
    transaction_log::{
        CommitError, ConflictSnafu, CorruptStateSnafu, StorageSnafu, UnpublishedCommitSnafu,
        actions::{CatalogAction, Commit},
    },
};

/// Reads and writes the commit log under a store root.
///
/// Layout:
///   <root>/_tablesink_log/0000000001.json
///   <root>/_tablesink_log/0000000002.json
///   <root>/_tablesink_log/CURRENT
#[derive(Debug, Clone)]
pub struct TransactionLogStore {
    location: StorageLocation,
}

impl TransactionLogStore {
    /// Log store rooted at `location`.
    pub fn new(location: StorageLocation) -> Self {
        Self { location }
    }

    /// Root this log belongs to.
    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    /// Load a single commit by version.
    ///
    /// Storage failures map to `CommitError::Storage`, JSON failures to
    /// `CommitError::CorruptState`.
    pub async fn load_commit(&self, version: u64) -> Result<Commit, CommitError> {
        let rel = layout::commit_rel_path(version);
        let json = storage::read_to_string(&self.location, &rel)
            .await
            .context(StorageSnafu)?;

        serde_json::from_str(&json).map_err(|e| CommitError::CorruptState {
            msg: format!("failed to parse commit {version}: {e}"),
            backtrace: Backtrace::capture(),
        })
    }

    /// Load the CURRENT version pointer.
    ///
    /// A missing CURRENT is an empty store (version 0). Empty or non-numeric
    /// content is `CorruptState`.
    pub async fn load_current_version(&self) -> Result<u64, CommitError> {
        let rel = layout::current_rel_path();

        let contents = match storage::read_to_string(&self.location, &rel).await {
            Ok(s) => s,
            Err(StorageError::NotFound { .. }) => return Ok(0),
            Err(source) => return Err(source).context(StorageSnafu),
        };

        let trimmed = contents.trim();
        ensure!(
            !trimmed.is_empty(),
            CorruptStateSnafu {
                msg: format!("CURRENT has empty content at {}", rel.display()),
            }
        );

        trimmed.parse::<u64>().map_err(|e| CommitError::CorruptState {
            msg: format!("CURRENT has invalid content {trimmed:?}: {e}"),
            backtrace: Backtrace::capture(),
        })
    }

    /// Commit `actions` as version `expected + 1`.
    ///
    /// The CURRENT comparison is advisory: two writers can both pass it. The
    /// real guard is creating the commit file with create-new semantics. When
    /// that file already exists, CURRENT is read again: if it has moved on,
    /// the loser gets `CommitError::Conflict`; if not, the file is an
    /// unpublished commit and the error is `CommitError::UnpublishedCommit`.
    /// Nothing here retries.
    ///
    /// A process that dies between writing the commit file and updating
    /// CURRENT leaves such an unpublished file behind. Readers ignore it
    /// (they stop at CURRENT), but every writer at the same base fails until
    /// an operator deletes it; the error message names the file.
    pub async fn commit_with_expected_version(
        &self,
        expected: u64,
        actions: Vec<CatalogAction>,
    ) -> Result<u64, CommitError> {
        let current = self.load_current_version().await?;
        if current != expected {
            return ConflictSnafu {
                expected,
                found: current,
            }
            .fail();
        }

        let version = expected.checked_add(1).context(CorruptStateSnafu {
            msg: "version counter overflow".to_string(),
        })?;

        let commit = Commit {
            version,
            base_version: expected,
            timestamp: Utc::now(),
            actions,
        };

        let json = serde_json::to_vec_pretty(&commit).map_err(|e| CommitError::CorruptState {
            msg: format!("failed to serialize commit {version}: {e}"),
            backtrace: Backtrace::capture(),
        })?;

        match storage::write_new(&self.location, &layout::commit_rel_path(version), &json).await {
            Ok(()) => {}
            Err(source @ StorageError::AlreadyExists { .. }) => {
                let current = self.load_current_version().await?;
                if current >= version {
                    return ConflictSnafu {
                        expected,
                        found: current,
                    }
                    .fail();
                }
                let path = match &source {
                    StorageError::AlreadyExists { path, .. } => path.clone(),
                    _ => layout::commit_rel_path(version).display().to_string(),
                };
                return Err(source).context(UnpublishedCommitSnafu {
                    version,
                    path,
                    current,
                });
            }
            Err(source) => return Err(source).context(StorageSnafu),
        }

        storage::write_atomic(
            &self.location,
            &layout::current_rel_path(),
            format!("{version}\n").as_bytes(),
        )
        .await
        .context(StorageSnafu)?;

        log::debug!("committed catalog version {version} (base {expected})");
        Ok(version)
    }
}
