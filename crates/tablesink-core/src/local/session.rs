//! Session over a local store root.

use async_trait::async_trait;
use snafu::prelude::*;

use crate::{
    catalog::{CatalogTransaction, StoreSession, TablePath},
    local::{
        error::{LocalStoreError, StorageSnafu, TableNotFoundSnafu, TransactionLogSnafu},
        transaction::{LocalTransaction, validate_name},
    },
    storage::StorageLocation,
    transaction_log::{CatalogState, TableState, TransactionLogStore},
};

/// Handle to a store rooted at a local directory.
///
/// Cheap to clone; holds no open files. Every transaction re-reads the log,
/// so several sessions (or processes) may share a root.
#[derive(Debug, Clone)]
pub struct LocalSession {
    log: TransactionLogStore,
}

impl LocalSession {
    /// Create the store directory if needed and open it.
    ///
    /// Opening a root that already holds a store is not an error.
    pub async fn init(location: StorageLocation) -> Result<Self, LocalStoreError> {
        location.create_root_dir().await.context(StorageSnafu)?;
        Self::open(location).await
    }

    /// Open an existing store directory.
    ///
    /// Fails when the root is missing or its log pointer is unreadable.
    pub async fn open(location: StorageLocation) -> Result<Self, LocalStoreError> {
        location.ensure_root_dir().await.context(StorageSnafu)?;
        let log_store = TransactionLogStore::new(location);
        let version = log_store
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;
        log::debug!("opened store at {:?} (version {version})", log_store.location());
        Ok(Self { log: log_store })
    }

    /// Where this store lives.
    pub fn location(&self) -> &StorageLocation {
        self.log.location()
    }

    /// Latest committed version.
    pub async fn version(&self) -> Result<u64, LocalStoreError> {
        self.log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)
    }

    /// Committed catalog as of now.
    pub async fn snapshot(&self) -> Result<CatalogState, LocalStoreError> {
        self.log
            .rebuild_catalog_state()
            .await
            .context(TransactionLogSnafu)
    }

    /// Committed state of a single table.
    pub async fn describe_table(&self, table: &TablePath) -> Result<TableState, LocalStoreError> {
        let snapshot = self.snapshot().await?;
        snapshot
            .table(table)
            .cloned()
            .context(TableNotFoundSnafu {
                table: table.clone(),
            })
    }

    /// Create a bucket and commit it; returns the new version.
    pub async fn create_bucket(&self, name: &str) -> Result<u64, LocalStoreError> {
        validate_name("bucket", name)?;
        let mut txn = self.begin_transaction().await?;
        txn.create_bucket(name)?;
        let version = txn.commit().await?;
        log::info!("created bucket {name} (version {version})");
        Ok(version)
    }
}

#[async_trait]
impl StoreSession for LocalSession {
    type Error = LocalStoreError;
    type Transaction = LocalTransaction;

    async fn begin_transaction(&self) -> Result<LocalTransaction, LocalStoreError> {
        let committed = self.snapshot().await?;
        Ok(LocalTransaction::new(self.log.clone(), committed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn init_creates_missing_root_and_is_reentrant() -> TestResult {
        let tmp = TempDir::new()?;
        let root = StorageLocation::local(tmp.path().join("store"));

        let first = LocalSession::init(root.clone()).await?;
        first.create_bucket("prod").await?;

        let again = LocalSession::init(root).await?;
        assert_eq!(again.version().await?, 1);
        assert!(again.snapshot().await?.bucket("prod").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn open_requires_an_existing_root() -> TestResult {
        let tmp = TempDir::new()?;
        let err = LocalSession::open(StorageLocation::local(tmp.path().join("missing")))
            .await
            .expect_err("missing root");

        assert!(matches!(
            err,
            LocalStoreError::Storage {
                source: StorageError::NotFound { .. }
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn create_bucket_is_not_idempotent() -> TestResult {
        let tmp = TempDir::new()?;
        let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;

        assert_eq!(session.create_bucket("prod").await?, 1);
        assert!(matches!(
            session.create_bucket("prod").await,
            Err(LocalStoreError::BucketAlreadyExists { bucket }) if bucket == "prod"
        ));
        assert!(matches!(
            session.create_bucket("_log").await,
            Err(LocalStoreError::InvalidName { .. })
        ));
        assert_eq!(session.version().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() -> TestResult {
        let tmp = TempDir::new()?;
        let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;
        session.create_bucket("prod").await?;

        {
            let mut txn = session.begin_transaction().await?;
            let bucket = txn.bucket("prod").await?;
            txn.create_schema(&bucket, "analytics").await?;
        }

        let snapshot = session.snapshot().await?;
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.schema("prod", "analytics").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_transactions_conflict_on_commit() -> TestResult {
        let tmp = TempDir::new()?;
        let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;
        session.create_bucket("prod").await?;

        let mut first = session.begin_transaction().await?;
        let mut second = session.begin_transaction().await?;

        let bucket = first.bucket("prod").await?;
        first.create_schema(&bucket, "a").await?;
        let bucket = second.bucket("prod").await?;
        second.create_schema(&bucket, "b").await?;

        assert_eq!(first.commit().await?, 2);
        let err = second.commit().await.expect_err("stale transaction");

        assert!(matches!(err, LocalStoreError::TransactionLog { .. }));
        assert!(session.snapshot().await?.schema("prod", "b").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn describe_table_reports_missing_tables() -> TestResult {
        let tmp = TempDir::new()?;
        let session = LocalSession::init(StorageLocation::local(tmp.path())).await?;

        assert!(matches!(
            session
                .describe_table(&TablePath::new("prod", "analytics", "events"))
                .await,
            Err(LocalStoreError::TableNotFound { .. })
        ));
        Ok(())
    }
}
