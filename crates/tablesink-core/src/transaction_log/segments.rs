//! Segment identifiers, formats, and per-file metadata recorded in the log.
//!
//! Pure data types only; writing segment bytes happens in the local store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a physical segment file.
///
/// The file path is stored separately in [`SegmentMeta`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Supported on-disk file formats for segments.
///
/// JSON layout example: `"format": "parquet"`
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Apache Parquet columnar format.
    #[default]
    Parquet,
}

/// Metadata about a single segment file holding rows of one table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentMeta {
    /// Logical identifier for this segment.
    pub segment_id: SegmentId,

    /// File path relative to the store root
    /// (for example `"data/prod/analytics/events/seg-….parquet"`).
    pub path: String,

    /// File format for this segment.
    pub format: FileFormat,

    /// Number of rows in this segment.
    pub row_count: u64,

    /// File size in bytes at the time the segment was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Derive a segment id from the segment's scope and encoded bytes.
///
/// `scope` distinguishes otherwise identical payloads written by different
/// transactions (the local store passes table, base version and ordinal), so
/// writing the same batch twice yields two segments.
pub fn segment_id_v1(scope: &str, data: &[u8]) -> SegmentId {
    let mut h = blake3::Hasher::new();
    h.update(b"tablesink-segment-v1");
    h.update(b"\0");
    h.update(scope.as_bytes());
    h.update(b"\0");
    h.update(data);
    let hex = h.finalize().to_hex();
    SegmentId(format!("seg-{}", &hex[..32]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_id_is_stable_and_scope_sensitive() {
        let a = segment_id_v1("prod/analytics/events@3#0", b"PAR1....PAR1");
        let again = segment_id_v1("prod/analytics/events@3#0", b"PAR1....PAR1");
        let other_scope = segment_id_v1("prod/analytics/events@4#0", b"PAR1....PAR1");
        let other_bytes = segment_id_v1("prod/analytics/events@3#0", b"PAR1...!PAR1");

        assert_eq!(a, again);
        assert_ne!(a, other_scope);
        assert_ne!(a, other_bytes);
        assert!(a.0.starts_with("seg-"));
        assert_eq!(a.0.len(), "seg-".len() + 32);
    }

    #[test]
    fn segment_meta_json_shape() {
        let meta = SegmentMeta {
            segment_id: SegmentId("seg-0001".to_string()),
            path: "data/b/s/t/seg-0001.parquet".to_string(),
            format: FileFormat::Parquet,
            row_count: 3,
            file_size: None,
        };

        let value = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(value["segment_id"], "seg-0001");
        assert_eq!(value["format"], "parquet");
        assert!(value.get("file_size").is_none());

        let back: SegmentMeta = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, meta);
    }
}
