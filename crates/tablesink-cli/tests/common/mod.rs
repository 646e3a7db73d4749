use std::{path::Path, sync::Arc};

use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const ACCESS_KEY: &str = "test-access";
pub const SECRET_KEY: &str = "test-secret";

/// Write `rows` rows of `id`/`name` (and `score` when `with_score`) to
/// `path`, split into record batches of at most `batch_rows` rows.
pub fn write_parquet_rows(
    path: &Path,
    rows: usize,
    batch_rows: usize,
    with_score: bool,
) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut fields = vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ];
    if with_score {
        fields.push(Field::new("score", DataType::Float64, true));
    }
    let schema = Arc::new(Schema::new(fields));

    let file = std::fs::File::create(path)?;
    let props = WriterProperties::builder()
        .set_max_row_group_size(batch_rows.max(1))
        .build();
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let mut start = 0;
    while start < rows {
        let end = (start + batch_rows).min(rows);
        let mut ids = Int64Builder::new();
        let mut names = StringBuilder::new();
        let mut scores = Float64Builder::new();
        for i in start..end {
            ids.append_value(i as i64);
            if i % 3 == 0 {
                names.append_null();
            } else {
                names.append_value(format!("row-{i}"));
            }
            scores.append_value(i as f64 / 2.0);
        }

        let mut columns: Vec<ArrayRef> = vec![Arc::new(ids.finish()), Arc::new(names.finish())];
        if with_score {
            columns.push(Arc::new(scores.finish()));
        }
        writer.write(&RecordBatch::try_new(schema.clone(), columns)?)?;
        start = end;
    }
    writer.close()?;

    Ok(())
}
