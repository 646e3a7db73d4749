//! Directory-backed store.
//!
//! A local store keeps its catalog (buckets, schemas, tables and their
//! columns) in the commit log under `_tablesink_log/` and table rows in
//! Parquet segment files under `data/`. All catalog and data changes of a
//! transaction land in a single commit, which makes schema widening and the
//! insert that needs it atomic.
//!
//! ```text
//! store_root/
//!   _tablesink_log/
//!     CURRENT
//!     0000000001.json
//!   data/
//!     prod/analytics/events/seg-<id>.parquet
//! ```
pub mod error;
pub mod session;
pub mod transaction;

pub use error::LocalStoreError;
pub use session::LocalSession;
pub use transaction::LocalTransaction;
