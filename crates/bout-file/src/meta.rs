//! Tile metadata extraction.
//!
//! Every dump file carries the information needed to place it in the
//! processor grid: the grid shape (`NXPE`, `NYPE`), guard-cell widths
//! (`MXG`, `MYG`), optionally its own position (`PE_XIND`, `PE_YIND`), and
//! a set of scalar run metadata. Scalars are stored either as global
//! attributes or as zero-dimensional variables; both are collected here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{FileError, FileResult};
use crate::handles::FileHandles;
use crate::scalar::ScalarValue;

/// Dimension layout of one variable in a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarMeta {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
}

impl VarMeta {
    /// Whether the variable evolves in time (leading `t` dimension).
    pub fn evolves(&self) -> bool {
        self.dims.first().map(String::as_str) == Some("t")
    }

    /// Index of the named dimension in this variable's layout.
    pub fn dim_index(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}

/// Everything needed to place one dump file in the reconstruction.
#[derive(Debug, Clone)]
pub struct TileMeta {
    pub path: PathBuf,
    /// Filename index (`<prefix>.<index>.nc`).
    pub index: usize,
    pub nxpe: usize,
    pub nype: usize,
    pub mxg: usize,
    pub myg: usize,
    /// Explicitly stored processor position, if present.
    pub pe_xind: Option<usize>,
    pub pe_yind: Option<usize>,
    /// File-level dimension sizes.
    pub dims: BTreeMap<String, usize>,
    /// Non-scalar variables with their layouts.
    pub variables: Vec<VarMeta>,
    /// Scalar run metadata (global attributes and zero-dimensional variables).
    pub scalars: BTreeMap<String, ScalarValue>,
}

impl TileMeta {
    /// Look up a variable's layout by name.
    pub fn variable(&self, name: &str) -> Option<&VarMeta> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Length of the named file dimension, erroring when absent.
    pub fn dim_len(&self, name: &str) -> FileResult<usize> {
        self.dims.get(name).copied().ok_or_else(|| {
            FileError::invalid_metadata(format!(
                "{}: missing dimension '{name}'",
                self.path.display()
            ))
        })
    }
}

/// Convert a scalar attribute value to our value model.
///
/// Integer widths are preserved; vector-valued attributes are not run
/// metadata and map to `None`.
fn probe_attribute(value: netcdf::AttributeValue) -> Option<ScalarValue> {
    use netcdf::AttributeValue as A;
    match value {
        A::Uchar(v) => Some(ScalarValue::Int(v as i64)),
        A::Schar(v) => Some(ScalarValue::Int(v as i64)),
        A::Ushort(v) => Some(ScalarValue::Int(v as i64)),
        A::Short(v) => Some(ScalarValue::Int(v as i64)),
        A::Uint(v) => Some(ScalarValue::Int(v as i64)),
        A::Int(v) => Some(ScalarValue::Int(v as i64)),
        A::Ulonglong(v) => i64::try_from(v).ok().map(ScalarValue::Int),
        A::Longlong(v) => Some(ScalarValue::Int(v)),
        A::Float(v) => Some(ScalarValue::Float(v as f64)),
        A::Double(v) => Some(ScalarValue::Float(v)),
        A::Str(v) => Some(ScalarValue::Text(v)),
        _ => None,
    }
}

/// Read the reconstruction metadata of one dump file.
///
/// Only shapes, attributes, and zero-dimensional variables are read; field
/// data stays on disk.
pub fn read_tile_meta(
    handles: &Mutex<FileHandles>,
    path: &Path,
    index: usize,
) -> FileResult<TileMeta> {
    let mut guard = handles.lock().expect("file-handle cache poisoned");
    guard.with_file(path, |file| extract_meta(file, path, index))
}

fn extract_meta(file: &netcdf::File, path: &Path, index: usize) -> FileResult<TileMeta> {
    let mut dims = BTreeMap::new();
    for dim in file.dimensions() {
        dims.insert(dim.name().to_string(), dim.len());
    }

    let mut scalars = BTreeMap::new();
    for attr in file.attributes() {
        let name = attr.name().to_string();
        match attr.value() {
            Ok(value) => {
                if let Some(scalar) = probe_attribute(value) {
                    scalars.insert(name, scalar);
                }
            }
            Err(e) => {
                debug!(path = %path.display(), attr = %name, error = %e,
                       "skipping unreadable global attribute");
            }
        }
    }

    let mut variables = Vec::new();
    for var in file.variables() {
        let name = var.name().to_string();
        let var_dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        if var_dims.is_empty() {
            // Zero-dimensional variables are scalar run metadata, not fields.
            match var.get_values::<f64, _>(..) {
                Ok(values) if values.len() == 1 => {
                    scalars.insert(name, ScalarValue::Float(values[0]));
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(path = %path.display(), var = %name, error = %e,
                           "skipping non-numeric scalar variable");
                }
            }
            continue;
        }
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        variables.push(VarMeta {
            name,
            dims: var_dims,
            shape,
        });
    }
    variables.sort_by(|a, b| a.name.cmp(&b.name));

    let count = |key: &str, default: usize| -> FileResult<usize> {
        match scalars.get(key) {
            Some(value) => value.as_count(key),
            None => Ok(default),
        }
    };
    let position = |key: &str| -> FileResult<Option<usize>> {
        match scalars.get(key) {
            Some(value) => value.as_count(key).map(Some),
            None => Ok(None),
        }
    };

    Ok(TileMeta {
        path: path.to_path_buf(),
        index,
        nxpe: count("NXPE", 1)?,
        nype: count("NYPE", 1)?,
        mxg: count("MXG", 0)?,
        myg: count("MYG", 0)?,
        pe_xind: position("PE_XIND")?,
        pe_yind: position("PE_YIND")?,
        dims,
        variables,
        scalars,
    })
}
