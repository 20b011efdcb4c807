//! Error types for dataset reconstruction.

use thiserror::Error;

/// Errors that can occur while assembling or exporting a dataset.
///
/// Every structural inconsistency is raised at open time; materialization
/// only surfaces I/O failures from the underlying files.
#[derive(Error, Debug)]
pub enum CollectError {
    /// No usable input files, or files that cannot form one topology.
    #[error("input error: {0}")]
    Input(String),

    /// Scalar metadata expected to be identical across tiles differs.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// An operation was given data of an unsupported number of dimensions.
    #[error("unsupported dimensionality for {operation}: {dims:?}")]
    UnsupportedDimensionality {
        operation: &'static str,
        dims: Vec<String>,
    },

    /// Mutually exclusive or otherwise invalid option combinations.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A geometry transform name is not registered.
    #[error("geometry '{0}' is not registered")]
    GeometryNotFound(String),

    /// A geometry transform name is already registered.
    #[error("geometry '{0}' is already registered")]
    GeometryExists(String),

    /// Error from per-tile file access.
    #[error(transparent)]
    File(#[from] bout_file::FileError),

    /// Error from the netCDF library (write paths).
    #[error("netCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array concatenation or reshape failure.
    #[error("array shape error: {0}")]
    Shape(String),
}

impl CollectError {
    /// Create an Input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Create a Metadata error.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<ndarray::ShapeError> for CollectError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Shape(err.to_string())
    }
}

/// Result type for reconstruction operations.
pub type CollectResult<T> = std::result::Result<T, CollectError>;
