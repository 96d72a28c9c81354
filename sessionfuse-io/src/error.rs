//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 I/O error.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// JSON parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sync recording error.
    #[error("sync recording error: {0}")]
    Sync(#[from] sessionfuse_sync::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] sessionfuse_core::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),
}

impl From<Error> for sessionfuse_core::Error {
    fn from(error: Error) -> Self {
        match error {
            // Typed consistency errors keep their identity across the
            // data-source seam; everything else is a source failure.
            Error::Core(core) => core,
            other => sessionfuse_core::Error::DataSource(other.to_string()),
        }
    }
}
