//! Schema-reconciling writes of Arrow batches into a transactional store.
//!
//! The entry point is [`writer::write_batch`]: given a session, a
//! bucket/schema/table name and a `RecordBatch`, it creates the schema and
//! table when they are missing, adds any new batch columns to the table, and
//! inserts the rows, all in one transaction.
//!
//! - `catalog`: the store contract the writer is written against
//!   ([`catalog::StoreSession`], [`catalog::CatalogTransaction`]).
//! - `delta`: the pure column-name difference between two schemas.
//! - `writer`: the reconciling write itself.
//! - `connect`: opening a session from an endpoint and credentials.
//! - `local`: a directory-backed store implementing the contract, built on
//!   an append-only commit log (`transaction_log`), a persisted schema model
//!   (`logical_schema`) and filesystem helpers (`storage`).
#![deny(missing_docs)]
pub mod catalog;
pub mod connect;
pub mod delta;
pub mod local;
pub mod logical_schema;
pub mod storage;
pub mod transaction_log;
pub mod writer;

pub use catalog::{BucketHandle, CatalogTransaction, Lookup, SchemaHandle, StoreSession, TablePath};
pub use connect::{ConnectError, StoreConfig, connect};
pub use delta::schema_delta;
pub use local::{LocalSession, LocalStoreError, LocalTransaction};
pub use writer::{Ensured, WriteReport, write_batch};
