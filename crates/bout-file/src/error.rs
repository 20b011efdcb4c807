//! Error types for per-tile file access.

use thiserror::Error;

/// Result type for tile-file operations.
pub type FileResult<T> = std::result::Result<T, FileError>;

/// Errors that can occur while reading or writing a single dump file.
#[derive(Error, Debug)]
pub enum FileError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the netCDF library.
    #[error("netCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    /// A required variable is not present in the file.
    #[error("missing variable '{0}'")]
    MissingVariable(String),

    /// Metadata in the file is malformed or out of the expected range.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The variable has more dimensions than the reader supports.
    #[error("variable '{var}' has unsupported rank {rank}")]
    UnsupportedRank { var: String, rank: usize },

    /// The data read back does not match the declared shape.
    #[error("shape mismatch for variable '{var}': {detail}")]
    ShapeMismatch { var: String, detail: String },
}

impl FileError {
    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}
