//! Log actions and commit payload definitions.
//!
//! Each commit file stores a [`Commit`] whose ordered [`CatalogAction`]s
//! create namespaces, create or widen tables, and register segment files.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::TablePath,
    logical_schema::{LogicalField, LogicalSchema},
    transaction_log::segments::SegmentMeta,
};

/// A catalog mutation recorded in a commit.
///
/// Actions are applied in order; see
/// [`CatalogState::apply`](crate::transaction_log::CatalogState::apply) for
/// the validation each one is subject to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CatalogAction {
    /// Register a new bucket.
    CreateBucket {
        /// Bucket name.
        bucket: String,
    },

    /// Register a new schema inside an existing bucket.
    CreateSchema {
        /// Owning bucket.
        bucket: String,
        /// Schema name.
        schema: String,
    },

    /// Register a new table with its initial columns.
    CreateTable {
        /// Table address.
        table: TablePath,
        /// Initial columns.
        columns: LogicalSchema,
    },

    /// Append columns to an existing table.
    AddColumns {
        /// Table address.
        table: TablePath,
        /// Columns to append, in order.
        columns: Vec<LogicalField>,
    },

    /// Make a written segment file part of a table.
    AddSegment {
        /// Table address.
        table: TablePath,
        /// Segment metadata.
        segment: SegmentMeta,
    },
}

/// A single, immutable commit in the catalog log.
///
/// Commits are written to files such as `_tablesink_log/0000000001.json`.
/// `version` must match the file name; `base_version` records which version
/// the writer had read when it prepared the commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    /// The version number of this commit (monotonic, starting from 1).
    pub version: u64,

    /// The version the writer believed was current. Used by the OCC guard.
    pub base_version: u64,

    /// Commit creation timestamp, stored as RFC3339 UTC.
    pub timestamp: DateTime<Utc>,

    /// Ordered list of catalog actions.
    pub actions: Vec<CatalogAction>,
}
