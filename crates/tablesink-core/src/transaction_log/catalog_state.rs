//! Materializing the catalog by replaying log commits.
//!
//! [`CatalogState`] is the in-memory view of every bucket, schema and table
//! recorded in `_tablesink_log/`. [`TransactionLogStore::rebuild_catalog_state`]
//! replays commits `1..=CURRENT`; transactions use [`CatalogState::apply`] on a
//! private copy to see their own staged actions.
use std::collections::BTreeMap;

use snafu::prelude::*;

use crate::{
    catalog::TablePath,
    logical_schema::{LogicalSchema, LogicalSchemaError},
    transaction_log::{
        CommitError, CorruptStateSnafu, TransactionLogStore,
        actions::CatalogAction,
        segments::{SegmentId, SegmentMeta},
    },
};

/// A table: its columns and the segment files holding its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    /// Current columns, in creation order.
    pub schema: LogicalSchema,
    /// Committed segments, in commit order.
    pub segments: Vec<SegmentMeta>,
}

impl TableState {
    /// Total rows across all segments.
    pub fn row_count(&self) -> u64 {
        self.segments.iter().map(|s| s.row_count).sum()
    }
}

/// Tables of one schema, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaState {
    /// Tables keyed by name.
    pub tables: BTreeMap<String, TableState>,
}

/// Schemas of one bucket, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketState {
    /// Schemas keyed by name.
    pub schemas: BTreeMap<String, SchemaState>,
}

/// Catalog contents at a given log version.
///
/// Invariant: equals the result of applying commits `1..=version` in order
/// to an empty catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogState {
    /// Log version this state reflects (0 for an empty store).
    pub version: u64,
    /// Buckets keyed by name.
    pub buckets: BTreeMap<String, BucketState>,
}

impl CatalogState {
    /// Look up a bucket.
    pub fn bucket(&self, bucket: &str) -> Option<&BucketState> {
        self.buckets.get(bucket)
    }

    /// Look up a schema.
    pub fn schema(&self, bucket: &str, schema: &str) -> Option<&SchemaState> {
        self.bucket(bucket)?.schemas.get(schema)
    }

    /// Look up a table.
    pub fn table(&self, path: &TablePath) -> Option<&TableState> {
        self.schema(&path.bucket, &path.schema)?
            .tables
            .get(&path.table)
    }

    fn table_mut(&mut self, path: &TablePath) -> Result<&mut TableState, CatalogStateError> {
        let bucket = self
            .buckets
            .get_mut(&path.bucket)
            .context(MissingBucketSnafu {
                bucket: &path.bucket,
            })?;
        let schema = bucket
            .schemas
            .get_mut(&path.schema)
            .context(MissingSchemaSnafu {
                bucket: &path.bucket,
                schema: &path.schema,
            })?;
        schema
            .tables
            .get_mut(&path.table)
            .context(MissingTableSnafu { table: path.clone() })
    }

    /// Apply one action in place.
    ///
    /// The state is left unchanged when an error is returned.
    pub fn apply(&mut self, action: &CatalogAction) -> Result<(), CatalogStateError> {
        match action {
            CatalogAction::CreateBucket { bucket } => {
                ensure!(
                    !self.buckets.contains_key(bucket),
                    BucketExistsSnafu { bucket }
                );
                self.buckets.insert(bucket.clone(), BucketState::default());
            }

            CatalogAction::CreateSchema { bucket, schema } => {
                let b = self
                    .buckets
                    .get_mut(bucket)
                    .context(MissingBucketSnafu { bucket })?;
                ensure!(
                    !b.schemas.contains_key(schema),
                    SchemaExistsSnafu { bucket, schema }
                );
                b.schemas.insert(schema.clone(), SchemaState::default());
            }

            CatalogAction::CreateTable { table, columns } => {
                let s = self
                    .buckets
                    .get_mut(&table.bucket)
                    .context(MissingBucketSnafu {
                        bucket: &table.bucket,
                    })?
                    .schemas
                    .get_mut(&table.schema)
                    .context(MissingSchemaSnafu {
                        bucket: &table.bucket,
                        schema: &table.schema,
                    })?;
                ensure!(
                    !s.tables.contains_key(&table.table),
                    TableExistsSnafu {
                        table: table.clone()
                    }
                );
                s.tables.insert(
                    table.table.clone(),
                    TableState {
                        schema: columns.clone(),
                        segments: Vec::new(),
                    },
                );
            }

            CatalogAction::AddColumns { table, columns } => {
                let t = self.table_mut(table)?;
                let widened = t
                    .schema
                    .with_added_columns(columns)
                    .context(SchemaSnafu {
                        table: table.clone(),
                    })?;
                t.schema = widened;
            }

            CatalogAction::AddSegment { table, segment } => {
                let t = self.table_mut(table)?;
                ensure!(
                    !t.segments
                        .iter()
                        .any(|s| s.segment_id == segment.segment_id),
                    DuplicateSegmentSnafu {
                        table: table.clone(),
                        segment_id: segment.segment_id.clone(),
                    }
                );
                t.segments.push(segment.clone());
            }
        }
        Ok(())
    }
}

impl TransactionLogStore {
    /// Rebuild the committed catalog by replaying every commit up to CURRENT.
    ///
    /// An empty store (CURRENT absent) yields an empty catalog at version 0.
    /// A commit whose payload version disagrees with its file name, or whose
    /// actions cannot be applied, is reported as `CorruptState`.
    pub async fn rebuild_catalog_state(&self) -> Result<CatalogState, CommitError> {
        let current_version = self.load_current_version().await?;
        let mut state = CatalogState::default();

        for v in 1..=current_version {
            let commit = self.load_commit(v).await?;

            ensure!(
                commit.version == v,
                CorruptStateSnafu {
                    msg: format!(
                        "Commit version mismatch: expected {v}, found {} in payload",
                        commit.version
                    ),
                }
            );

            for action in &commit.actions {
                state.apply(action).map_err(|e| CommitError::CorruptState {
                    msg: format!("commit {v} cannot be applied: {e}"),
                    backtrace: snafu::Backtrace::capture(),
                })?;
            }
        }

        state.version = current_version;
        Ok(state)
    }
}

/// An action does not fit the state it is applied to.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CatalogStateError {
    /// Bucket already registered.
    #[snafu(display("Bucket already exists: {bucket}"))]
    BucketExists {
        /// Bucket name.
        bucket: String,
    },

    /// Schema already registered in the bucket.
    #[snafu(display("Schema already exists: {bucket}/{schema}"))]
    SchemaExists {
        /// Bucket name.
        bucket: String,
        /// Schema name.
        schema: String,
    },

    /// Table already registered in the schema.
    #[snafu(display("Table already exists: {table}"))]
    TableExists {
        /// Table address.
        table: TablePath,
    },

    /// Referenced bucket is unknown.
    #[snafu(display("Bucket not found: {bucket}"))]
    MissingBucket {
        /// Bucket name.
        bucket: String,
    },

    /// Referenced schema is unknown.
    #[snafu(display("Schema not found: {bucket}/{schema}"))]
    MissingSchema {
        /// Bucket name.
        bucket: String,
        /// Schema name.
        schema: String,
    },

    /// Referenced table is unknown.
    #[snafu(display("Table not found: {table}"))]
    MissingTable {
        /// Table address.
        table: TablePath,
    },

    /// Widening produced an invalid schema (for example a duplicate column).
    #[snafu(display("Invalid schema change on {table}: {source}"))]
    Schema {
        /// Table address.
        table: TablePath,
        /// Underlying validation error.
        source: LogicalSchemaError,
    },

    /// The segment id is already part of the table.
    #[snafu(display("Segment {segment_id} already registered on {table}"))]
    DuplicateSegment {
        /// Table address.
        table: TablePath,
        /// Offending segment id.
        segment_id: SegmentId,
    },
}
