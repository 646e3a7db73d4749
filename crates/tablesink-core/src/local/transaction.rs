//! Local store transactions.
//!
//! A [`LocalTransaction`] starts from the catalog committed at some version
//! `base`, stages [`CatalogAction`]s against a private copy of that catalog,
//! and on commit appends them to the log as version `base + 1`. Reads inside
//! the transaction see the private copy, so a table created a moment ago can
//! be widened and filled in the same transaction.
//!
//! Segment files are written when rows are inserted, before the commit. A
//! transaction that is dropped leaves such files unreferenced; they are never
//! read because only committed `AddSegment` actions point at them.

use std::{mem, sync::Arc};

use arrow::{
    array::{ArrayRef, new_null_array},
    datatypes::{Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use async_trait::async_trait;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use snafu::prelude::*;

use crate::{
    catalog::{BucketHandle, CatalogTransaction, Lookup, SchemaHandle, TablePath},
    local::error::{
        ArrowSnafu, BucketAlreadyExistsSnafu, BucketNotFoundSnafu, CatalogSnafu,
        ColumnAlreadyExistsSnafu, ColumnTypeMismatchSnafu, EmptyColumnFragmentSnafu,
        InvalidNameSnafu, LocalStoreError, MissingRequiredColumnSnafu,
        NullsInNonNullableColumnSnafu, ParquetEncodeSnafu, SchemaAlreadyExistsSnafu,
        SchemaConvertSnafu, SchemaNotFoundSnafu, StorageSnafu, TableAlreadyExistsSnafu,
        TableNotFoundSnafu, TransactionLogSnafu, UnknownColumnSnafu, UnsupportedSchemaSnafu,
    },
    logical_schema::{LogicalDataType, LogicalSchema},
    storage::{self, StorageError, layout},
    transaction_log::{
        CatalogAction, CatalogState, FileFormat, SegmentMeta, TableState, TransactionLogStore,
        segment_id_v1,
    },
};

/// Reject names that cannot safely be used as a directory name.
pub(crate) fn validate_name(kind: &'static str, name: &str) -> Result<(), LocalStoreError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.contains(['/', '\\', '\0']) {
        Some("must not contain '/', '\\' or NUL")
    } else if name.starts_with('.') || name.starts_with('_') {
        Some("must not start with '.' or '_'")
    } else {
        None
    };

    match reason {
        Some(reason) => InvalidNameSnafu { kind, name, reason }.fail(),
        None => Ok(()),
    }
}

/// An open transaction against a local store.
///
/// Dropping it without calling [`CatalogTransaction::commit`] discards every
/// staged change.
#[derive(Debug)]
pub struct LocalTransaction {
    log: TransactionLogStore,
    base_version: u64,
    view: CatalogState,
    staged: Vec<CatalogAction>,
    segments_written: usize,
    finished: bool,
}

impl LocalTransaction {
    pub(crate) fn new(log: TransactionLogStore, committed: CatalogState) -> Self {
        Self {
            log,
            base_version: committed.version,
            view: committed,
            staged: Vec::new(),
            segments_written: 0,
            finished: false,
        }
    }

    /// Version of the catalog this transaction was opened on.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    /// Catalog as seen by this transaction (committed state plus staged changes).
    pub fn view(&self) -> &CatalogState {
        &self.view
    }

    /// Actions staged so far, in order.
    pub fn staged_actions(&self) -> &[CatalogAction] {
        &self.staged
    }

    /// Stage the creation of a bucket.
    ///
    /// Administrative operation: the writer never calls it.
    pub fn create_bucket(&mut self, name: &str) -> Result<BucketHandle, LocalStoreError> {
        validate_name("bucket", name)?;
        ensure!(
            self.view.bucket(name).is_none(),
            BucketAlreadyExistsSnafu { bucket: name }
        );
        self.stage(CatalogAction::CreateBucket {
            bucket: name.to_string(),
        })?;
        Ok(BucketHandle::new(name))
    }

    fn stage(&mut self, action: CatalogAction) -> Result<(), LocalStoreError> {
        self.view.apply(&action).context(CatalogSnafu)?;
        self.staged.push(action);
        Ok(())
    }

    fn require_bucket(&self, bucket: &BucketHandle) -> Result<(), LocalStoreError> {
        ensure!(
            self.view.bucket(&bucket.name).is_some(),
            BucketNotFoundSnafu {
                bucket: &bucket.name
            }
        );
        Ok(())
    }

    fn require_schema(&self, schema: &SchemaHandle) -> Result<(), LocalStoreError> {
        ensure!(
            self.view.bucket(&schema.bucket).is_some(),
            BucketNotFoundSnafu {
                bucket: &schema.bucket
            }
        );
        ensure!(
            self.view.schema(&schema.bucket, &schema.name).is_some(),
            SchemaNotFoundSnafu {
                bucket: &schema.bucket,
                schema: &schema.name,
            }
        );
        Ok(())
    }

    fn require_table(&self, table: &TablePath) -> Result<&TableState, LocalStoreError> {
        self.view
            .table(table)
            .context(TableNotFoundSnafu { table: table.clone() })
    }

    /// Validate `batch` against the table and re-shape it to the table's
    /// column order, filling absent (nullable) columns with nulls.
    fn conform_batch(
        &self,
        table: &TablePath,
        batch: &RecordBatch,
    ) -> Result<RecordBatch, LocalStoreError> {
        let state = self.require_table(table)?;
        let batch_schema = batch.schema();

        for field in batch_schema.fields() {
            let Some(column) = state.schema.column(field.name()) else {
                return UnknownColumnSnafu {
                    table: table.clone(),
                    column: field.name(),
                }
                .fail();
            };

            let matches = LogicalDataType::try_from_arrow(field.name(), field.data_type())
                .is_ok_and(|dt| dt == column.data_type);
            ensure!(
                matches,
                ColumnTypeMismatchSnafu {
                    table: table.clone(),
                    column: field.name(),
                    expected: column.data_type.clone(),
                    found: field.data_type().to_string(),
                }
            );
        }

        let stored = state
            .schema
            .to_arrow_schema()
            .context(SchemaConvertSnafu { table: table.clone() })?;

        let mut fields = Vec::with_capacity(stored.fields().len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(stored.fields().len());

        for target in stored.fields() {
            match batch_schema.index_of(target.name()) {
                Ok(idx) => {
                    let array = batch.column(idx).clone();
                    let null_count = array.null_count();
                    ensure!(
                        target.is_nullable() || null_count == 0,
                        NullsInNonNullableColumnSnafu {
                            table: table.clone(),
                            column: target.name(),
                            null_count,
                        }
                    );
                    // Keep the batch's physical type; it is logically identical.
                    fields.push(Field::new(
                        target.name(),
                        array.data_type().clone(),
                        target.is_nullable(),
                    ));
                    columns.push(array);
                }
                Err(_) => {
                    ensure!(
                        target.is_nullable(),
                        MissingRequiredColumnSnafu {
                            table: table.clone(),
                            column: target.name(),
                        }
                    );
                    fields.push(Field::clone(target));
                    columns.push(new_null_array(target.data_type(), batch.num_rows()));
                }
            }
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
            .context(ArrowSnafu { table: table.clone() })
    }

    async fn write_segment(
        &mut self,
        table: &TablePath,
        batch: &RecordBatch,
    ) -> Result<SegmentMeta, LocalStoreError> {
        let data = encode_parquet(table, batch)?;

        let scope = format!("{table}@{}#{}", self.base_version, self.segments_written);
        let segment_id = segment_id_v1(&scope, &data);
        let rel_path = layout::segment_rel_path(table, &segment_id.0);

        match storage::write_new(self.log.location(), &rel_path, &data).await {
            Ok(()) => {}
            // Same id implies same scope and bytes: left behind by an aborted attempt.
            Err(StorageError::AlreadyExists { .. }) => {}
            Err(source) => return Err(source).context(StorageSnafu),
        }
        self.segments_written += 1;

        Ok(SegmentMeta {
            segment_id,
            path: rel_path.display().to_string(),
            format: FileFormat::Parquet,
            row_count: batch.num_rows() as u64,
            file_size: Some(data.len() as u64),
        })
    }
}

fn encode_parquet(table: &TablePath, batch: &RecordBatch) -> Result<Bytes, LocalStoreError> {
    let mut buffer = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None)
            .context(ParquetEncodeSnafu { table: table.clone() })?;
        writer
            .write(batch)
            .context(ParquetEncodeSnafu { table: table.clone() })?;
        writer
            .close()
            .context(ParquetEncodeSnafu { table: table.clone() })?;
    }
    Ok(Bytes::from(buffer))
}

#[async_trait]
impl CatalogTransaction for LocalTransaction {
    type Error = LocalStoreError;

    async fn bucket(&mut self, name: &str) -> Result<BucketHandle, LocalStoreError> {
        let handle = BucketHandle::new(name);
        self.require_bucket(&handle)?;
        Ok(handle)
    }

    async fn schema(
        &mut self,
        bucket: &BucketHandle,
        name: &str,
    ) -> Result<Lookup<SchemaHandle>, LocalStoreError> {
        self.require_bucket(bucket)?;
        Ok(self
            .view
            .schema(&bucket.name, name)
            .map(|_| SchemaHandle::new(bucket, name))
            .into())
    }

    async fn create_schema(
        &mut self,
        bucket: &BucketHandle,
        name: &str,
    ) -> Result<SchemaHandle, LocalStoreError> {
        validate_name("schema", name)?;
        self.require_bucket(bucket)?;
        ensure!(
            self.view.schema(&bucket.name, name).is_none(),
            SchemaAlreadyExistsSnafu {
                bucket: &bucket.name,
                schema: name,
            }
        );

        self.stage(CatalogAction::CreateSchema {
            bucket: bucket.name.clone(),
            schema: name.to_string(),
        })?;
        Ok(SchemaHandle::new(bucket, name))
    }

    async fn table(
        &mut self,
        schema: &SchemaHandle,
        name: &str,
    ) -> Result<Lookup<TablePath>, LocalStoreError> {
        self.require_schema(schema)?;
        let path = schema.table_path(name);
        Ok(self.view.table(&path).map(|_| path.clone()).into())
    }

    async fn create_table(
        &mut self,
        schema: &SchemaHandle,
        name: &str,
        columns: &Schema,
    ) -> Result<TablePath, LocalStoreError> {
        validate_name("table", name)?;
        self.require_schema(schema)?;

        let path = schema.table_path(name);
        ensure!(
            self.view.table(&path).is_none(),
            TableAlreadyExistsSnafu {
                table: path.clone()
            }
        );

        let columns = LogicalSchema::try_from_arrow(columns).context(UnsupportedSchemaSnafu {
            table: path.clone(),
        })?;

        self.stage(CatalogAction::CreateTable {
            table: path.clone(),
            columns,
        })?;
        Ok(path)
    }

    async fn table_schema(&mut self, table: &TablePath) -> Result<SchemaRef, LocalStoreError> {
        self.require_table(table)?
            .schema
            .to_arrow_schema_ref()
            .context(SchemaConvertSnafu {
                table: table.clone(),
            })
    }

    async fn add_column(
        &mut self,
        table: &TablePath,
        fragment: &Schema,
    ) -> Result<(), LocalStoreError> {
        let state = self.require_table(table)?;
        ensure!(
            !fragment.fields().is_empty(),
            EmptyColumnFragmentSnafu {
                table: table.clone()
            }
        );

        for field in fragment.fields() {
            ensure!(
                state.schema.column(field.name()).is_none(),
                ColumnAlreadyExistsSnafu {
                    table: table.clone(),
                    column: field.name(),
                }
            );
        }

        let added = LogicalSchema::try_from_arrow(fragment).context(UnsupportedSchemaSnafu {
            table: table.clone(),
        })?;

        self.stage(CatalogAction::AddColumns {
            table: table.clone(),
            columns: added.columns().to_vec(),
        })
    }

    async fn insert(&mut self, table: &TablePath, batch: &RecordBatch) -> Result<u64, LocalStoreError> {
        let conformed = self.conform_batch(table, batch)?;
        if conformed.num_rows() == 0 {
            log::debug!("insert into {table}: empty batch, nothing staged");
            return Ok(0);
        }

        let segment = self.write_segment(table, &conformed).await?;
        let rows = segment.row_count;
        log::debug!(
            "insert into {table}: staged segment {} ({rows} rows)",
            segment.segment_id
        );

        self.stage(CatalogAction::AddSegment {
            table: table.clone(),
            segment,
        })?;
        Ok(rows)
    }

    async fn commit(self) -> Result<u64, LocalStoreError> {
        let mut this = self;
        this.finished = true;
        if this.staged.is_empty() {
            return Ok(this.base_version);
        }

        let actions = mem::take(&mut this.staged);
        this.log
            .commit_with_expected_version(this.base_version, actions)
            .await
            .context(TransactionLogSnafu)
    }
}

impl Drop for LocalTransaction {
    fn drop(&mut self) {
        if !self.finished && !self.staged.is_empty() {
            log::debug!(
                "aborting transaction on version {}: discarding {} staged actions",
                self.base_version,
                self.staged.len()
            );
        }
    }
}
