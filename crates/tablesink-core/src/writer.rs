//! Schema-reconciling batch writer.
//!
//! [`write_batch`] appends one Arrow batch to `bucket/schema/table`, creating
//! the schema and table when they are missing and adding any batch columns
//! the table does not have yet. Every step runs in one transaction opened on
//! the caller's session: either all of it becomes visible or none of it does.
//!
//! Per call the writer moves through
//! `txn open → bucket resolved → schema ensured → table ensured → schema
//! widened → inserted → committed`, leaving on the first error. The
//! transaction is aborted by dropping it; errors are returned unchanged and
//! nothing is retried.
//!
//! Buckets are never created here. Same-named columns with different types
//! are not compared either; the store decides what to do with such a batch
//! when it is inserted.

use arrow::{datatypes::Schema, record_batch::RecordBatch};

use crate::{
    catalog::{BucketHandle, CatalogTransaction, Lookup, SchemaHandle, StoreSession, TablePath},
    delta::schema_delta,
};

/// Outcome of a find-or-create step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured<T> {
    /// The object already existed.
    Reused(T),
    /// The object was created in this transaction.
    Created(T),
}

impl<T> Ensured<T> {
    /// True when the object was created by this call.
    pub fn was_created(&self) -> bool {
        matches!(self, Ensured::Created(_))
    }

    /// Borrow the handle.
    pub fn get(&self) -> &T {
        match self {
            Ensured::Reused(v) | Ensured::Created(v) => v,
        }
    }

    /// Take the handle.
    pub fn into_inner(self) -> T {
        match self {
            Ensured::Reused(v) | Ensured::Created(v) => v,
        }
    }
}

/// What a [`write_batch`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Table that received the rows.
    pub table: TablePath,
    /// The schema did not exist and was created.
    pub schema_created: bool,
    /// The table did not exist and was created from the batch's columns.
    pub table_created: bool,
    /// Columns added to an existing table, in the order they were added.
    pub added_columns: Vec<String>,
    /// Rows reported inserted by the store.
    pub rows_inserted: u64,
    /// Store version after the commit.
    pub version: u64,
}

/// Look up schema `name` in `bucket`, creating it when absent.
pub async fn ensure_schema<T>(
    txn: &mut T,
    bucket: &BucketHandle,
    name: &str,
) -> Result<Ensured<SchemaHandle>, T::Error>
where
    T: CatalogTransaction,
{
    match txn.schema(bucket, name).await? {
        Lookup::Found(schema) => Ok(Ensured::Reused(schema)),
        Lookup::Absent => Ok(Ensured::Created(txn.create_schema(bucket, name).await?)),
    }
}

/// Look up table `name` in `schema`, creating it with `columns` when absent.
pub async fn ensure_table<T>(
    txn: &mut T,
    schema: &SchemaHandle,
    name: &str,
    columns: &Schema,
) -> Result<Ensured<TablePath>, T::Error>
where
    T: CatalogTransaction,
{
    match txn.table(schema, name).await? {
        Lookup::Found(table) => Ok(Ensured::Reused(table)),
        Lookup::Absent => Ok(Ensured::Created(
            txn.create_table(schema, name, columns).await?,
        )),
    }
}

/// Add every column of `desired` that `table` lacks, one fragment at a time.
///
/// Returns the names of the added columns.
pub async fn widen_table<T>(
    txn: &mut T,
    table: &TablePath,
    desired: &Schema,
) -> Result<Vec<String>, T::Error>
where
    T: CatalogTransaction,
{
    let existing = txn.table_schema(table).await?;
    let delta = schema_delta(&existing, desired);

    let mut added = Vec::with_capacity(delta.len());
    for fragment in &delta {
        txn.add_column(table, fragment).await?;
        added.extend(fragment.fields().iter().map(|f| f.name().clone()));
    }
    Ok(added)
}

/// Append `batch` to `bucket/schema/table` in one transaction.
///
/// The bucket must already exist. The schema and table are created when
/// missing (the table with the batch's columns); columns present in the batch
/// but not in the table are added before the insert. On any error the
/// transaction is dropped, which aborts it, and the session's error is
/// returned as is.
pub async fn write_batch<S>(
    session: &S,
    bucket: &str,
    schema: &str,
    table: &str,
    batch: &RecordBatch,
) -> Result<WriteReport, S::Error>
where
    S: StoreSession,
{
    let mut txn = session.begin_transaction().await?;

    let bucket_handle = txn.bucket(bucket).await?;
    log::debug!("write {bucket}/{schema}/{table}: bucket resolved");

    let schema_handle = ensure_schema(&mut txn, &bucket_handle, schema).await?;
    let schema_created = schema_handle.was_created();
    let schema_handle = schema_handle.into_inner();

    let batch_schema = batch.schema();
    let table_path = ensure_table(&mut txn, &schema_handle, table, &batch_schema).await?;
    let table_created = table_path.was_created();
    let table_path = table_path.into_inner();
    log::debug!(
        "write {table_path}: schema {}, table {}",
        if schema_created { "created" } else { "reused" },
        if table_created { "created" } else { "reused" },
    );

    let added_columns = widen_table(&mut txn, &table_path, &batch_schema).await?;
    if !added_columns.is_empty() {
        log::debug!("write {table_path}: added columns {added_columns:?}");
    }

    let rows_inserted = txn.insert(&table_path, batch).await?;
    log::debug!("write {table_path}: inserted {rows_inserted} rows");

    let version = txn.commit().await?;
    log::info!("wrote {rows_inserted} rows to {table_path} (version {version})");

    Ok(WriteReport {
        table: table_path,
        schema_created,
        table_created,
        added_columns,
        rows_inserted,
        version,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use arrow::{
        array::{Float64Array, Int64Array},
        datatypes::{DataType, Field, SchemaRef},
    };
    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        local::{LocalSession, LocalStoreError, LocalTransaction},
        storage::StorageLocation,
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;
    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Session that records every transaction call before delegating.
    struct Recording {
        inner: LocalSession,
        calls: CallLog,
    }

    struct RecordingTxn {
        inner: LocalTransaction,
        calls: CallLog,
    }

    impl RecordingTxn {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().expect("call log").push(call.into());
        }
    }

    #[async_trait]
    impl StoreSession for Recording {
        type Error = LocalStoreError;
        type Transaction = RecordingTxn;

        async fn begin_transaction(&self) -> Result<RecordingTxn, LocalStoreError> {
            self.calls.lock().expect("call log").push("begin".into());
            Ok(RecordingTxn {
                inner: self.inner.begin_transaction().await?,
                calls: self.calls.clone(),
            })
        }
    }

    #[async_trait]
    impl CatalogTransaction for RecordingTxn {
        type Error = LocalStoreError;

        async fn bucket(&mut self, name: &str) -> Result<BucketHandle, LocalStoreError> {
            self.record("bucket");
            self.inner.bucket(name).await
        }

        async fn schema(
            &mut self,
            bucket: &BucketHandle,
            name: &str,
        ) -> Result<Lookup<SchemaHandle>, LocalStoreError> {
            self.record("schema");
            self.inner.schema(bucket, name).await
        }

        async fn create_schema(
            &mut self,
            bucket: &BucketHandle,
            name: &str,
        ) -> Result<SchemaHandle, LocalStoreError> {
            self.record("create_schema");
            self.inner.create_schema(bucket, name).await
        }

        async fn table(
            &mut self,
            schema: &SchemaHandle,
            name: &str,
        ) -> Result<Lookup<TablePath>, LocalStoreError> {
            self.record("table");
            self.inner.table(schema, name).await
        }

        async fn create_table(
            &mut self,
            schema: &SchemaHandle,
            name: &str,
            columns: &Schema,
        ) -> Result<TablePath, LocalStoreError> {
            self.record("create_table");
            self.inner.create_table(schema, name, columns).await
        }

        async fn table_schema(&mut self, table: &TablePath) -> Result<SchemaRef, LocalStoreError> {
            self.record("table_schema");
            self.inner.table_schema(table).await
        }

        async fn add_column(
            &mut self,
            table: &TablePath,
            fragment: &Schema,
        ) -> Result<(), LocalStoreError> {
            self.record(format!("add_column {}", fragment.field(0).name()));
            self.inner.add_column(table, fragment).await
        }

        async fn insert(
            &mut self,
            table: &TablePath,
            batch: &RecordBatch,
        ) -> Result<u64, LocalStoreError> {
            self.record("insert");
            self.inner.insert(table, batch).await
        }

        async fn commit(self) -> Result<u64, LocalStoreError> {
            self.record("commit");
            self.inner.commit().await
        }
    }

    async fn recording_store(tmp: &TempDir) -> Result<Recording, LocalStoreError> {
        let inner = LocalSession::init(StorageLocation::local(tmp.path())).await?;
        inner.create_bucket("prod").await?;
        Ok(Recording {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn take_calls(store: &Recording) -> Vec<String> {
        std::mem::take(&mut *store.calls.lock().expect("call log"))
    }

    fn id_batch(ids: Vec<i64>) -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)])),
            vec![Arc::new(Int64Array::from(ids))],
        )
        .expect("valid batch")
    }

    fn id_score_batch() -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("score", DataType::Float64, true),
            ])),
            vec![
                Arc::new(Int64Array::from(vec![3])),
                Arc::new(Float64Array::from(vec![0.9])),
            ],
        )
        .expect("valid batch")
    }

    #[tokio::test]
    async fn fresh_destination_creates_schema_then_table() -> TestResult {
        let tmp = TempDir::new()?;
        let store = recording_store(&tmp).await?;

        let report = write_batch(&store, "prod", "analytics", "events", &id_batch(vec![1, 2])).await?;

        assert!(report.schema_created);
        assert!(report.table_created);
        assert!(report.added_columns.is_empty());
        assert_eq!(report.rows_inserted, 2);
        assert_eq!(
            take_calls(&store),
            [
                "begin",
                "bucket",
                "schema",
                "create_schema",
                "table",
                "create_table",
                "table_schema",
                "insert",
                "commit"
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn existing_destination_is_reused_and_widened() -> TestResult {
        let tmp = TempDir::new()?;
        let store = recording_store(&tmp).await?;
        write_batch(&store, "prod", "analytics", "events", &id_batch(vec![1])).await?;
        take_calls(&store);

        let report = write_batch(&store, "prod", "analytics", "events", &id_score_batch()).await?;

        assert!(!report.schema_created);
        assert!(!report.table_created);
        assert_eq!(report.added_columns, ["score"]);
        assert_eq!(
            take_calls(&store),
            [
                "begin",
                "bucket",
                "schema",
                "table",
                "table_schema",
                "add_column score",
                "insert",
                "commit"
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_bucket_stops_before_any_creation() -> TestResult {
        let tmp = TempDir::new()?;
        let store = recording_store(&tmp).await?;

        let err = write_batch(&store, "ghost", "analytics", "events", &id_batch(vec![1]))
            .await
            .expect_err("bucket does not exist");

        assert!(matches!(err, LocalStoreError::BucketNotFound { bucket } if bucket == "ghost"));
        assert_eq!(take_calls(&store), ["begin", "bucket"]);
        Ok(())
    }

    #[tokio::test]
    async fn insert_failure_skips_commit() -> TestResult {
        let tmp = TempDir::new()?;
        let store = recording_store(&tmp).await?;
        write_batch(&store, "prod", "analytics", "events", &id_batch(vec![1])).await?;
        take_calls(&store);

        // `id` keeps its stored type; a Utf8 `id` is rejected by the store.
        let conflicting = RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("id", DataType::Utf8, false),
                Field::new("score", DataType::Float64, true),
            ])),
            vec![
                Arc::new(arrow::array::StringArray::from(vec!["x"])),
                Arc::new(Float64Array::from(vec![1.0])),
            ],
        )?;
        let err = write_batch(&store, "prod", "analytics", "events", &conflicting)
            .await
            .expect_err("type conflict");

        assert!(matches!(err, LocalStoreError::ColumnTypeMismatch { .. }));
        let calls = take_calls(&store);
        assert_eq!(calls.last().map(String::as_str), Some("insert"));
        assert!(!calls.iter().any(|c| c == "commit"));
        Ok(())
    }

    #[test]
    fn ensured_exposes_handle_either_way() {
        let created = Ensured::Created(5);
        let reused = Ensured::Reused(5);

        assert!(created.was_created());
        assert!(!reused.was_created());
        assert_eq!(created.get(), reused.get());
        assert_eq!(reused.into_inner(), 5);
    }
}
