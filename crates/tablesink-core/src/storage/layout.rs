//! On-disk layout helpers for a store root.
//!
//! This module centralizes all *relative* path conventions under a store root:
//! - transaction log directory / commit file naming (`_tablesink_log/`)
//! - data directory for Parquet segments (`data/<bucket>/<schema>/<table>/`)
//!
//! The functions here return relative [`std::path::PathBuf`] values. Callers
//! join them with a [`crate::storage::StorageLocation`] before doing IO.

use std::path::PathBuf;

use crate::catalog::TablePath;

// ====================
// Data layout
// ====================

/// Directory under the store root where segment files are stored.
pub const DATA_DIR_NAME: &str = "data";

/// File extension used for Parquet segments.
pub const SEGMENT_EXT: &str = "parquet";

/// Relative path: `data/`
pub fn data_rel_dir() -> PathBuf {
    PathBuf::from(DATA_DIR_NAME)
}

/// Relative path: `data/<bucket>/<schema>/<table>/`
pub fn table_data_rel_dir(table: &TablePath) -> PathBuf {
    data_rel_dir()
        .join(&table.bucket)
        .join(&table.schema)
        .join(&table.table)
}

/// Relative path: `data/<bucket>/<schema>/<table>/<segment_id>.parquet`
pub fn segment_rel_path(table: &TablePath, segment_id: &str) -> PathBuf {
    table_data_rel_dir(table).join(format!("{segment_id}.{SEGMENT_EXT}"))
}

// ====================
// Transaction log layout
// ====================

/// Name of the subdirectory containing the commit log.
pub const LOG_DIR_NAME: &str = "_tablesink_log";

/// Name of the file that stores the current version pointer.
pub const CURRENT_FILE_NAME: &str = "CURRENT";

/// Number of digits used in zero-padded commit file names.
pub const COMMIT_FILENAME_DIGITS: usize = 10;

/// Relative path: `_tablesink_log/`
pub fn log_rel_dir() -> PathBuf {
    PathBuf::from(LOG_DIR_NAME)
}

/// Relative path: `_tablesink_log/CURRENT`
pub fn current_rel_path() -> PathBuf {
    log_rel_dir().join(CURRENT_FILE_NAME)
}

/// Relative path: `_tablesink_log/<zero-padded>.json`
pub fn commit_rel_path(version: u64) -> PathBuf {
    let file_name = format!("{:0width$}.json", version, width = COMMIT_FILENAME_DIGITS);
    log_rel_dir().join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_paths_are_zero_padded() {
        assert_eq!(
            commit_rel_path(7),
            PathBuf::from("_tablesink_log/0000000007.json")
        );
        assert_eq!(current_rel_path(), PathBuf::from("_tablesink_log/CURRENT"));
    }

    #[test]
    fn segment_path_nests_bucket_schema_table() {
        let table = TablePath::new("prod", "analytics", "events");
        assert_eq!(
            segment_rel_path(&table, "seg-abc"),
            PathBuf::from("data/prod/analytics/events/seg-abc.parquet")
        );
    }
}
