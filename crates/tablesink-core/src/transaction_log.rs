//! Append-only catalog log and the catalog state materialized from it.
//!
//! Every change to a local store (bucket, schema and table creation, column
//! additions, new data segments) is recorded as an ordered list of
//! [`CatalogAction`]s inside one JSON [`Commit`]. Commits are versioned
//! `1, 2, 3, …` and a `CURRENT` pointer names the latest one.
//!
//! The log is:
//!
//! - **Append-only**: commit files are created once and never rewritten.
//! - **Optimistically concurrent**: a commit names the version it was built
//!   on and fails with [`CommitError::Conflict`] if that is no longer current.
//! - **Human-inspectable**: plain JSON, one file per commit.
//!
//! ## On-disk layout
//!
//! ```text
//! store_root/
//!   _tablesink_log/
//!     CURRENT                  # latest committed version (e.g. "3\n")
//!     0000000001.json
//!     0000000002.json
//!     0000000003.json
//!   data/
//!     <bucket>/<schema>/<table>/seg-<id>.parquet
//! ```
//!
//! A commit file looks like:
//!
//! ```json
//! {
//!   "version": 2,
//!   "base_version": 1,
//!   "timestamp": "2025-01-01T00:00:00Z",
//!   "actions": [
//!     { "AddColumns": { "table": { "bucket": "prod", "schema": "analytics", "table": "events" },
//!                       "columns": [ { "name": "score", "data_type": "Float64", "nullable": true } ] } },
//!     { "AddSegment": { "table": { "bucket": "prod", "schema": "analytics", "table": "events" },
//!                       "segment": { "segment_id": "seg-…", "path": "data/prod/analytics/events/seg-….parquet",
//!                                    "format": "parquet", "row_count": 3, "file_size": 1234 } } }
//!   ]
//! }
//! ```
//!
//! Readers rebuild [`CatalogState`] by replaying commits up to `CURRENT`.
pub mod actions;
pub mod catalog_state;
pub mod log_store;
pub mod segments;

pub use actions::{CatalogAction, Commit};
pub use catalog_state::{BucketState, CatalogState, CatalogStateError, SchemaState, TableState};
pub use log_store::TransactionLogStore;
pub use segments::{FileFormat, SegmentId, SegmentMeta, segment_id_v1};

use snafu::{Backtrace, prelude::*};

use crate::storage::StorageError;

/// Errors that can occur while reading or writing the commit log.
#[derive(Debug, Snafu)]
pub enum CommitError {
    /// The caller's expected version does not match the CURRENT pointer.
    #[snafu(display("Commit conflict: expected version {expected}, but CURRENT is {found}"))]
    Conflict {
        /// The version the caller expected to be current.
        expected: u64,
        /// The actual current version found.
        found: u64,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// Underlying storage error while working with the log or CURRENT file.
    #[snafu(display("Storage error while accessing commit log: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// Commit file `version` exists but CURRENT was never advanced to it.
    ///
    /// Either another writer is between the two steps of its commit, or a
    /// writer died there. In the second case the store stays stuck at the
    /// previous version until the file at `path` is removed.
    #[snafu(display(
        "Commit {version} already exists at {path} but CURRENT is still {current}. \
         If no other writer is committing, delete {path} to unblock the store."
    ))]
    UnpublishedCommit {
        /// Version the commit file claims.
        version: u64,
        /// Absolute path of the unpublished commit file.
        path: String,
        /// Version CURRENT points at.
        current: u64,
        /// The create-new failure that exposed the file.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// The log or CURRENT file is malformed or inconsistent.
    #[snafu(display("Corrupt log state: {msg}"))]
    CorruptState {
        /// A description of the corrupt state.
        msg: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::TablePath,
        logical_schema::{LogicalDataType, LogicalField, LogicalSchema, LogicalTimestampUnit},
    };
    use chrono::{TimeZone, Utc};

    #[test]
    fn commit_json_uses_externally_tagged_actions() {
        let table = TablePath::new("prod", "analytics", "events");
        let commit = Commit {
            version: 1,
            base_version: 0,
            timestamp: Utc
                .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .expect("valid UTC timestamp"),
            actions: vec![
                CatalogAction::CreateTable {
                    table: table.clone(),
                    columns: LogicalSchema::new(vec![LogicalField::new(
                        "ts",
                        LogicalDataType::Timestamp {
                            unit: LogicalTimestampUnit::Micros,
                            timezone: None,
                        },
                        false,
                    )])
                    .expect("valid logical schema"),
                },
                CatalogAction::AddSegment {
                    table,
                    segment: SegmentMeta {
                        segment_id: SegmentId("seg-0001".to_string()),
                        path: "data/prod/analytics/events/seg-0001.parquet".to_string(),
                        format: FileFormat::Parquet,
                        row_count: 10,
                        file_size: Some(512),
                    },
                },
            ],
        };

        let value = serde_json::to_value(&commit).expect("serialize commit");

        assert_eq!(value["timestamp"], "2025-01-01T00:00:00Z");
        assert_eq!(value["actions"][0]["CreateTable"]["table"]["schema"], "analytics");
        assert_eq!(value["actions"][1]["AddSegment"]["segment"]["row_count"], 10);

        let back: Commit = serde_json::from_value(value).expect("deserialize commit");
        assert_eq!(back, commit);
    }
}
