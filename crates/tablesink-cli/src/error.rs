use tablesink_core::{ConnectError, LocalStoreError, storage::StorageError};

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Missing --{flag} (or set {env})"))]
    MissingOption {
        flag: &'static str,
        env: &'static str,
    },

    #[snafu(display("Invalid store location: {source}"))]
    Location { source: StorageError },

    #[snafu(display("Failed to initialize store at {store}: {source}"))]
    InitStore {
        store: String,
        #[snafu(source(from(LocalStoreError, Box::new)))]
        source: Box<LocalStoreError>,
    },

    #[snafu(display("{source}"))]
    Connect {
        #[snafu(source(from(ConnectError, Box::new)))]
        source: Box<ConnectError>,
    },

    #[snafu(display("Failed to create bucket {bucket}: {source}"))]
    CreateBucket {
        bucket: String,
        #[snafu(source(from(LocalStoreError, Box::new)))]
        source: Box<LocalStoreError>,
    },

    #[snafu(display("Parquet file not found or not accessible: {path}"))]
    ParquetMissing {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read parquet file {path}: {source}"))]
    ParquetRead {
        path: String,
        source: parquet::errors::ParquetError,
    },

    #[snafu(display("Failed to decode a record batch from {path}: {source}"))]
    BatchRead {
        path: String,
        source: arrow::error::ArrowError,
    },

    #[snafu(display("Write to {table} failed: {source}"))]
    Write {
        table: String,
        #[snafu(source(from(LocalStoreError, Box::new)))]
        source: Box<LocalStoreError>,
    },

    #[snafu(display("Failed to describe {table}: {source}"))]
    Describe {
        table: String,
        #[snafu(source(from(LocalStoreError, Box::new)))]
        source: Box<LocalStoreError>,
    },
}
