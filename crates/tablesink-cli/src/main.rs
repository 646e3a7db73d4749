//! CLI tool for writing Arrow data into tablesink stores.

mod error;
mod logging;

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use arrow::record_batch::RecordBatch;
use clap::{ArgAction, Args, Parser, Subcommand};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use snafu::{OptionExt, ResultExt};
use tablesink_core::{LocalSession, TablePath, WriteReport, connect, storage::StorageLocation, write_batch};

use crate::error::{
    BatchReadSnafu, CliResult, ConnectSnafu, CreateBucketSnafu, DescribeSnafu, InitStoreSnafu,
    LocationSnafu, MissingOptionSnafu, ParquetMissingSnafu, ParquetReadSnafu, WriteSnafu,
};

#[derive(Debug, Args)]
struct Destination {
    #[arg(long)]
    bucket: String,

    #[arg(long)]
    schema: String,

    #[arg(long)]
    table: String,
}

impl Destination {
    fn path(&self) -> TablePath {
        TablePath::new(&self.bucket, &self.schema, &self.table)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty store at --store
    Init,

    /// Create a bucket (writes never create buckets)
    CreateBucket {
        #[arg(long)]
        bucket: String,
    },

    /// Write a Parquet file into a table, creating or widening it as needed
    Write {
        #[command(flatten)]
        dest: Destination,

        #[arg(long)]
        parquet: PathBuf,
    },

    /// Print a table's columns and row count
    Describe {
        #[command(flatten)]
        dest: Destination,
    },
}

#[derive(Debug, Parser)]
#[command(name = "tablesink", version)]
struct Cli {
    /// Store endpoint: a directory or a file:// URL
    #[arg(long, global = true, env = "TABLESINK_ENDPOINT")]
    store: Option<String>,

    #[arg(long = "access-key", global = true, env = "TABLESINK_ACCESS_KEY")]
    access_key: Option<String>,

    #[arg(
        long = "secret-key",
        global = true,
        env = "TABLESINK_SECRET_KEY",
        hide_env_values = true
    )]
    secret_key: Option<String>,

    /// -v for info, -vv for debug
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

impl Cli {
    fn store(&self) -> CliResult<&str> {
        self.store.as_deref().context(MissingOptionSnafu {
            flag: "store",
            env: "TABLESINK_ENDPOINT",
        })
    }

    async fn connect(&self) -> CliResult<LocalSession> {
        let store = self.store()?;
        let access_key = self.access_key.as_deref().context(MissingOptionSnafu {
            flag: "access-key",
            env: "TABLESINK_ACCESS_KEY",
        })?;
        let secret_key = self.secret_key.as_deref().context(MissingOptionSnafu {
            flag: "secret-key",
            env: "TABLESINK_SECRET_KEY",
        })?;

        connect(store, access_key, secret_key)
            .await
            .context(ConnectSnafu)
    }
}

async fn cmd_init(store: &str) -> CliResult<()> {
    let location = StorageLocation::parse(store).context(LocationSnafu)?;
    let session = LocalSession::init(location)
        .await
        .context(InitStoreSnafu { store })?;

    let version = session
        .version()
        .await
        .context(InitStoreSnafu { store })?;
    println!("Initialized store at {store} (version {version})");
    Ok(())
}

async fn cmd_create_bucket(session: &LocalSession, bucket: &str) -> CliResult<()> {
    let version = session
        .create_bucket(bucket)
        .await
        .context(CreateBucketSnafu { bucket })?;

    println!("Created bucket {bucket} (version {version})");
    Ok(())
}

async fn write_one(
    session: &LocalSession,
    dest: &Destination,
    batch: &RecordBatch,
) -> CliResult<WriteReport> {
    write_batch(session, &dest.bucket, &dest.schema, &dest.table, batch)
        .await
        .context(WriteSnafu {
            table: dest.path().to_string(),
        })
}

async fn cmd_write(session: &LocalSession, dest: &Destination, parquet: &Path) -> CliResult<()> {
    let path = parquet.display().to_string();
    let file = File::open(parquet).context(ParquetMissingSnafu { path: &path })?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context(ParquetReadSnafu { path: &path })?;
    let file_schema = builder.schema().clone();
    let reader = builder.build().context(ParquetReadSnafu { path: &path })?;

    // One transaction per record batch.
    let mut rows = 0u64;
    let mut version = None;
    for batch in reader {
        let batch = batch.context(BatchReadSnafu { path: &path })?;
        let report = write_one(session, dest, &batch).await?;
        log::info!(
            "batch of {} rows committed as version {}",
            report.rows_inserted,
            report.version
        );
        rows += report.rows_inserted;
        version = Some(report.version);
    }

    // A file without rows still creates the destination.
    let version = match version {
        Some(v) => v,
        None => {
            write_one(session, dest, &RecordBatch::new_empty(file_schema))
                .await?
                .version
        }
    };

    println!("Wrote {rows} rows to {} (version {version})", dest.path());
    Ok(())
}

async fn cmd_describe(session: &LocalSession, dest: &Destination) -> CliResult<()> {
    let table = dest.path();
    let state = session
        .describe_table(&table)
        .await
        .context(DescribeSnafu {
            table: table.to_string(),
        })?;

    println!("{table}");
    for column in state.schema.columns() {
        println!("  {column}");
    }
    println!("rows: {}", state.row_count());
    Ok(())
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match &cli.cmd {
        Command::Init => cmd_init(cli.store()?).await,

        Command::CreateBucket { bucket } => {
            let session = cli.connect().await?;
            cmd_create_bucket(&session, bucket).await
        }

        Command::Write { dest, parquet } => {
            let session = cli.connect().await?;
            cmd_write(&session, dest, parquet).await
        }

        Command::Describe { dest } => {
            let session = cli.connect().await?;
            cmd_describe(&session, dest).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
