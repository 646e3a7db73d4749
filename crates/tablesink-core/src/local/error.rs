//! Error types and SNAFU context selectors for the local store.
//!
//! `LocalStoreError` is the `Error` type of the local [`StoreSession`] and
//! [`CatalogTransaction`] implementations, so it is what the writer surfaces
//! unchanged when something goes wrong against a local store.
//!
//! [`StoreSession`]: crate::catalog::StoreSession
//! [`CatalogTransaction`]: crate::catalog::CatalogTransaction

use parquet::errors::ParquetError;
use snafu::prelude::*;

use crate::{
    catalog::TablePath,
    logical_schema::{LogicalDataType, LogicalSchemaError, SchemaConvertError},
    storage::StorageError,
    transaction_log::{CatalogStateError, CommitError},
};

/// Errors raised by the local store backend.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LocalStoreError {
    /// The bucket does not exist. Buckets are only created administratively.
    #[snafu(display("Bucket not found: {bucket}"))]
    BucketNotFound {
        /// Bucket name.
        bucket: String,
    },

    /// Administrative bucket creation hit an existing bucket.
    #[snafu(display("Bucket already exists: {bucket}"))]
    BucketAlreadyExists {
        /// Bucket name.
        bucket: String,
    },

    /// The schema does not exist in the bucket.
    #[snafu(display("Schema not found: {bucket}/{schema}"))]
    SchemaNotFound {
        /// Bucket name.
        bucket: String,
        /// Schema name.
        schema: String,
    },

    /// The schema already exists in the bucket.
    #[snafu(display("Schema already exists: {bucket}/{schema}"))]
    SchemaAlreadyExists {
        /// Bucket name.
        bucket: String,
        /// Schema name.
        schema: String,
    },

    /// The table does not exist.
    #[snafu(display("Table not found: {table}"))]
    TableNotFound {
        /// Table address.
        table: TablePath,
    },

    /// The table already exists.
    #[snafu(display("Table already exists: {table}"))]
    TableAlreadyExists {
        /// Table address.
        table: TablePath,
    },

    /// A bucket, schema or table name is not usable as a path component.
    #[snafu(display("Invalid {kind} name {name:?}: {reason}"))]
    InvalidName {
        /// What was being named ("bucket", "schema", "table").
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// Which rule it broke.
        reason: &'static str,
    },

    /// `add_column` named a column the table already has.
    #[snafu(display("Column {column} already exists in {table}"))]
    ColumnAlreadyExists {
        /// Table address.
        table: TablePath,
        /// Column name.
        column: String,
    },

    /// `add_column` was given a fragment without fields.
    #[snafu(display("Column fragment for {table} has no fields"))]
    EmptyColumnFragment {
        /// Table address.
        table: TablePath,
    },

    /// An Arrow schema (table definition or column fragment) cannot be stored.
    #[snafu(display("Cannot store columns for {table}: {source}"))]
    UnsupportedSchema {
        /// Table address.
        table: TablePath,
        /// Conversion / validation failure.
        source: LogicalSchemaError,
    },

    /// A stored schema could not be turned back into Arrow.
    #[snafu(display("Stored schema of {table} cannot be converted to Arrow: {source}"))]
    SchemaConvert {
        /// Table address.
        table: TablePath,
        /// Conversion failure.
        source: SchemaConvertError,
    },

    /// Inserted batch has a column the table does not have.
    #[snafu(display("Column {column} does not exist in {table}"))]
    UnknownColumn {
        /// Table address.
        table: TablePath,
        /// Column name.
        column: String,
    },

    /// Inserted batch column has a different type than the table column.
    #[snafu(display(
        "Type mismatch for column {column} in {table}: table has {expected}, batch has {found}"
    ))]
    ColumnTypeMismatch {
        /// Table address.
        table: TablePath,
        /// Column name.
        column: String,
        /// Stored column type.
        expected: LogicalDataType,
        /// Batch column type, rendered from Arrow.
        found: String,
    },

    /// A non-nullable table column is absent from the inserted batch.
    #[snafu(display("Column {column} of {table} is not nullable and missing from the batch"))]
    MissingRequiredColumn {
        /// Table address.
        table: TablePath,
        /// Column name.
        column: String,
    },

    /// The batch carries nulls for a non-nullable table column.
    #[snafu(display("Column {column} of {table} is not nullable but the batch has {null_count} nulls"))]
    NullsInNonNullableColumn {
        /// Table address.
        table: TablePath,
        /// Column name.
        column: String,
        /// Number of nulls found.
        null_count: usize,
    },

    /// Encoding a batch to Parquet failed.
    #[snafu(display("Parquet encode error for {table}: {source}"))]
    ParquetEncode {
        /// Table address.
        table: TablePath,
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// Re-shaping a batch to the table layout failed.
    #[snafu(display("Arrow error for {table}: {source}"))]
    Arrow {
        /// Table address.
        table: TablePath,
        /// Underlying Arrow error.
        source: arrow::error::ArrowError,
    },

    /// A staged action did not apply to the transaction's catalog view.
    #[snafu(display("Catalog update rejected: {source}"))]
    Catalog {
        /// Underlying state error.
        source: CatalogStateError,
    },

    /// Transaction log / commit failure (conflicts, corrupt log, IO).
    #[snafu(display("Transaction log error: {source}"))]
    TransactionLog {
        /// Underlying commit error.
        #[snafu(source, backtrace)]
        source: CommitError,
    },

    /// Storage failure outside the log (store root, segment files).
    #[snafu(display("Storage error: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(source, backtrace)]
        source: StorageError,
    },
}
