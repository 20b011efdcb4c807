//! Scalar metadata values carried by dump files.

use crate::error::{FileError, FileResult};

/// A single scalar metadata value read from a dump file.
///
/// Dump files carry run metadata both as global attributes and as
/// zero-dimensional variables. Attributes keep their integer identity via
/// lossless probing; zero-dimensional variables are read through the netCDF
/// double conversion and stored as `Float`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// The value as an integer, if it is one or holds one exactly.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
            Self::Float(_) | Self::Text(_) => None,
        }
    }

    /// The value as a float, if numeric.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(_) => None,
        }
    }

    /// The value as text, if textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a non-negative count, erroring on anything else.
    pub fn as_count(&self, key: &str) -> FileResult<usize> {
        self.as_int()
            .filter(|i| *i >= 0)
            .map(|i| i as usize)
            .ok_or_else(|| {
                FileError::invalid_metadata(format!(
                    "'{key}' is not a non-negative integer: {self}"
                ))
            })
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}
