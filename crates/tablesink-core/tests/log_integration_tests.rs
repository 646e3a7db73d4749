//! On-disk effects of writes: segment contents, commit files, orphans.
#![allow(missing_docs)]

use std::{fs::File, sync::Arc};

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tablesink_core::{
    CatalogTransaction, LocalSession, LocalStoreError, StoreSession, TablePath,
    storage::{StorageLocation, layout},
    transaction_log::{CatalogAction, Commit},
    write_batch,
};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn events() -> TablePath {
    TablePath::new("prod", "analytics", "events")
}

fn id_name(ids: Vec<i64>, names: Vec<&str>) -> RecordBatch {
    RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ])),
        vec![
            Arc::new(Int64Array::from(ids)) as ArrayRef,
            Arc::new(StringArray::from(names)),
        ],
    )
    .expect("valid batch")
}

fn read_segment(root: &std::path::Path, rel: &str) -> Result<Vec<RecordBatch>, Box<dyn std::error::Error>> {
    let file = File::open(root.join(rel))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    Ok(reader.collect::<Result<Vec<_>, _>>()?)
}

fn parquet_files_under(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "parquet"))
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn segments_hold_rows_in_table_column_order() -> TestResult {
    let tmp = TempDir::new()?;
    let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;
    session.create_bucket("prod").await?;

    write_batch(&session, "prod", "analytics", "events", &id_name(vec![1, 2], vec!["a", "b"])).await?;

    // Widen with `score`, then write a batch that omits `name` and lists
    // columns in a different order.
    let scored = RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            Field::new("score", DataType::Float64, true),
            Field::new("id", DataType::Int64, false),
        ])),
        vec![
            Arc::new(Float64Array::from(vec![0.5])) as ArrayRef,
            Arc::new(Int64Array::from(vec![3])),
        ],
    )?;
    let report = write_batch(&session, "prod", "analytics", "events", &scored).await?;
    assert_eq!(report.added_columns, ["score"]);

    let table = session.describe_table(&events()).await?;
    assert_eq!(table.segments.len(), 2);

    let first = read_segment(tmp.path(), &table.segments[0].path)?;
    assert_eq!(first.iter().map(RecordBatch::num_rows).sum::<usize>(), 2);

    let second = read_segment(tmp.path(), &table.segments[1].path)?;
    let batch = &second[0];
    let names: Vec<_> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, ["id", "name", "score"]);

    let ids = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("id is Int64");
    assert_eq!(ids.value(0), 3);
    assert_eq!(batch.column(1).null_count(), 1);
    assert_eq!(table.segments[1].row_count, 1);
    Ok(())
}

#[tokio::test]
async fn commit_files_record_the_actions_of_a_write() -> TestResult {
    let tmp = TempDir::new()?;
    let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;
    session.create_bucket("prod").await?;

    let report = write_batch(&session, "prod", "analytics", "events", &id_name(vec![1], vec!["a"])).await?;
    assert_eq!(report.version, 2);

    let current = std::fs::read_to_string(tmp.path().join(layout::current_rel_path()))?;
    assert_eq!(current.trim(), "2");

    let json = std::fs::read_to_string(tmp.path().join(layout::commit_rel_path(2)))?;
    let commit: Commit = serde_json::from_str(&json)?;
    assert_eq!(commit.version, 2);
    assert_eq!(commit.base_version, 1);

    let kinds: Vec<_> = commit
        .actions
        .iter()
        .map(|a| match a {
            CatalogAction::CreateBucket { .. } => "bucket",
            CatalogAction::CreateSchema { .. } => "schema",
            CatalogAction::CreateTable { .. } => "table",
            CatalogAction::AddColumns { .. } => "columns",
            CatalogAction::AddSegment { .. } => "segment",
        })
        .collect();
    assert_eq!(kinds, ["schema", "table", "segment"]);
    Ok(())
}

#[tokio::test]
async fn aborted_inserts_leave_unreferenced_files() -> TestResult {
    let tmp = TempDir::new()?;
    let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;
    session.create_bucket("prod").await?;
    write_batch(&session, "prod", "analytics", "events", &id_name(vec![1], vec!["a"])).await?;

    {
        let mut txn = session.begin_transaction().await?;
        txn.insert(&events(), &id_name(vec![7, 8, 9], vec!["x", "y", "z"]))
            .await?;
    }

    let data_dir = tmp.path().join(layout::table_data_rel_dir(&events()));
    assert_eq!(parquet_files_under(&data_dir), 2);

    let table = session.describe_table(&events()).await?;
    assert_eq!(table.segments.len(), 1);
    assert_eq!(table.row_count(), 1);
    Ok(())
}

#[tokio::test]
async fn corrupt_pointer_surfaces_as_a_log_error() -> TestResult {
    let tmp = TempDir::new()?;
    let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;
    session.create_bucket("prod").await?;

    std::fs::write(tmp.path().join(layout::current_rel_path()), "not-a-version")?;

    let err = write_batch(&session, "prod", "analytics", "events", &id_name(vec![1], vec!["a"]))
        .await
        .expect_err("CURRENT is unreadable");
    assert!(matches!(err, LocalStoreError::TransactionLog { .. }));

    let err = LocalSession::open(StorageLocation::local(tmp.path()))
        .await
        .expect_err("open checks CURRENT");
    assert!(matches!(err, LocalStoreError::TransactionLog { .. }));
    Ok(())
}
