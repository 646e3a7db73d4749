//! Storage error types shared by every filesystem helper.

use std::io;

use snafu::{Backtrace, prelude::*};

/// Failure of a storage operation, keyed by what the caller can act on.
///
/// I/O errors are sorted by kind: a missing path and a create-new collision
/// get their own variants because the commit log treats both as states.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// Nothing exists at `path` (or it is not the expected kind of entry).
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// Absolute path that was accessed.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Where the error was raised.
        backtrace: Backtrace,
    },

    /// A create-new write found an existing file.
    #[snafu(display("Path already exists: {path}"))]
    AlreadyExists {
        /// Absolute path that already exists.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Where the error was raised.
        backtrace: Backtrace,
    },

    /// Any other filesystem failure.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// Absolute path being accessed.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Where the error was raised.
        backtrace: Backtrace,
    },

    /// The endpoint string does not name a supported store location.
    #[snafu(display("Invalid store location {spec:?}: {reason}"))]
    InvalidLocation {
        /// Endpoint as given by the caller.
        spec: String,
        /// Why it was rejected.
        reason: String,
        /// Where the error was raised.
        backtrace: Backtrace,
    },
}
