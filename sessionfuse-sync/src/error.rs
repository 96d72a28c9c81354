//! Sync-recording error types.

use thiserror::Error;

/// Result type for sync-recording operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Sync-recording error types.
#[derive(Error, Debug)]
pub enum Error {
    /// HDF5 I/O error.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// The metadata blob is missing or malformed.
    #[error("invalid sync metadata: {0}")]
    InvalidMeta(String),

    /// The event table is malformed.
    #[error("invalid event table: {0}")]
    InvalidFormat(String),

    /// A line label is not present in the recording.
    #[error("unknown sync line '{line}' (labels: {labels:?})")]
    UnknownLine { line: String, labels: Vec<String> },
}
