//! Store-facing contract used by the writer.
//!
//! A store is a three-level namespace (bucket → schema → table) reached
//! through a [`StoreSession`]. Every mutation happens inside a
//! [`CatalogTransaction`]; dropping a transaction without calling
//! [`CatalogTransaction::commit`] aborts it.
//!
//! Objects are addressed by small owned handles ([`BucketHandle`],
//! [`SchemaHandle`], [`TablePath`]) instead of borrowed references into the
//! transaction, so a caller can hold several of them while still calling
//! `&mut self` methods on the transaction.

use std::{error::Error, fmt};

use arrow::{
    datatypes::{Schema, SchemaRef},
    record_batch::RecordBatch,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a tolerant lookup: the object, or an explicit "not there".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The named object exists.
    Found(T),
    /// No object with that name exists.
    Absent,
}

impl<T> Lookup<T> {
    /// Convert into an `Option`, dropping the distinction's name.
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Absent => None,
        }
    }

    /// True when the object was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::Absent,
        }
    }
}

/// A resolved bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketHandle {
    /// Bucket name.
    pub name: String,
}

impl BucketHandle {
    /// Handle for the bucket called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A resolved schema inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaHandle {
    /// Owning bucket name.
    pub bucket: String,
    /// Schema name.
    pub name: String,
}

impl SchemaHandle {
    /// Handle for schema `name` in `bucket`.
    pub fn new(bucket: &BucketHandle, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.name.clone(),
            name: name.into(),
        }
    }

    /// Fully-qualified path of table `table` inside this schema.
    pub fn table_path(&self, table: impl Into<String>) -> TablePath {
        TablePath {
            bucket: self.bucket.clone(),
            schema: self.name.clone(),
            table: table.into(),
        }
    }
}

/// Fully-qualified table address; doubles as the table handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TablePath {
    /// Bucket name.
    pub bucket: String,
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
}

impl TablePath {
    /// Build a path from its three components.
    pub fn new(
        bucket: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bucket, self.schema, self.table)
    }
}

/// A live connection to a store that can open transactions.
///
/// Sessions are owned by the caller; nothing in this crate closes them.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Error type shared by the session and its transactions.
    type Error: Error + Send + Sync + 'static;

    /// Transaction type opened by this session.
    type Transaction: CatalogTransaction<Error = Self::Error>;

    /// Open a new transaction.
    async fn begin_transaction(&self) -> Result<Self::Transaction, Self::Error>;
}

/// One atomic unit of catalog and data changes.
///
/// Reads inside the transaction observe its own staged changes. Nothing
/// becomes visible to other transactions until [`commit`](Self::commit)
/// succeeds; dropping the transaction discards everything staged.
#[async_trait]
pub trait CatalogTransaction: Send {
    /// Error type raised by every operation.
    type Error: Error + Send + Sync + 'static;

    /// Resolve a bucket. Fails when the bucket does not exist.
    async fn bucket(&mut self, name: &str) -> Result<BucketHandle, Self::Error>;

    /// Tolerant schema lookup.
    async fn schema(
        &mut self,
        bucket: &BucketHandle,
        name: &str,
    ) -> Result<Lookup<SchemaHandle>, Self::Error>;

    /// Create a schema inside `bucket`.
    async fn create_schema(
        &mut self,
        bucket: &BucketHandle,
        name: &str,
    ) -> Result<SchemaHandle, Self::Error>;

    /// Tolerant table lookup.
    async fn table(
        &mut self,
        schema: &SchemaHandle,
        name: &str,
    ) -> Result<Lookup<TablePath>, Self::Error>;

    /// Create a table whose initial columns are `columns`.
    async fn create_table(
        &mut self,
        schema: &SchemaHandle,
        name: &str,
        columns: &Schema,
    ) -> Result<TablePath, Self::Error>;

    /// Current column schema of a table, including staged additions.
    async fn table_schema(&mut self, table: &TablePath) -> Result<SchemaRef, Self::Error>;

    /// Add the column(s) described by `fragment` to a table.
    async fn add_column(&mut self, table: &TablePath, fragment: &Schema)
    -> Result<(), Self::Error>;

    /// Insert every row of `batch`; returns the number of rows inserted.
    async fn insert(&mut self, table: &TablePath, batch: &RecordBatch) -> Result<u64, Self::Error>;

    /// Make all staged changes durable and visible together.
    ///
    /// Returns the store version observed after the commit.
    async fn commit(self) -> Result<u64, Self::Error>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compose_into_a_table_path() {
        let bucket = BucketHandle::new("prod");
        let schema = SchemaHandle::new(&bucket, "analytics");
        let path = schema.table_path("events");

        assert_eq!(path, TablePath::new("prod", "analytics", "events"));
        assert_eq!(path.to_string(), "prod/analytics/events");
    }

    #[test]
    fn lookup_mirrors_option() {
        let found: Lookup<u8> = Some(3).into();
        let absent: Lookup<u8> = None.into();

        assert!(found.is_found());
        assert!(!absent.is_found());
        assert_eq!(found.into_option(), Some(3));
        assert_eq!(absent, Lookup::Absent);
    }
}
