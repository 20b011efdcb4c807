//! The reconstructed dataset and its accessor methods.

use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use bout_file::FileHandles;

use crate::error::{CollectError, CollectResult};
use crate::lazy::LazyArray;
use crate::metadata::RunMetadata;
use crate::options::Options;

/// Time dimension name in dump files.
pub const TIME_DIM: &str = "t";
/// First spatial dimension name.
pub const X_DIM: &str = "x";
/// Second spatial dimension name.
pub const Y_DIM: &str = "y";
/// Periodic third dimension name (never decomposed, never guarded).
pub const Z_DIM: &str = "z";

/// The closed set of variable layouts this crate operates on.
///
/// Anything else is rejected with an explicit error rather than handled by
/// a fall-through branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimLayout {
    /// No dimensions.
    Scalar,
    /// `(t,)` — a pure time trace such as `t_array`.
    TimeTrace,
    /// `(x, y)`.
    XY,
    /// `(x, y, z)`.
    XYZ,
    /// `(t, x, y)`.
    TXY,
    /// `(t, x, y, z)`.
    TXYZ,
}

impl DimLayout {
    /// Classify a dimension list, erroring on unsupported arities.
    pub fn classify(operation: &'static str, dims: &[String]) -> CollectResult<Self> {
        let names: Vec<&str> = dims.iter().map(String::as_str).collect();
        match names.as_slice() {
            [] => Ok(Self::Scalar),
            [TIME_DIM] => Ok(Self::TimeTrace),
            [X_DIM, Y_DIM] => Ok(Self::XY),
            [X_DIM, Y_DIM, Z_DIM] => Ok(Self::XYZ),
            [TIME_DIM, X_DIM, Y_DIM] => Ok(Self::TXY),
            [TIME_DIM, X_DIM, Y_DIM, Z_DIM] => Ok(Self::TXYZ),
            _ => Err(CollectError::UnsupportedDimensionality {
                operation,
                dims: dims.to_vec(),
            }),
        }
    }

    /// Whether the layout has a leading time dimension.
    pub fn evolves(&self) -> bool {
        matches!(self, Self::TimeTrace | Self::TXY | Self::TXYZ)
    }
}

/// One variable of the reconstructed dataset.
///
/// The merged run metadata is attached to every field as well as to the
/// dataset, so it survives selections that only keep single variables.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub dims: Vec<String>,
    pub data: LazyArray,
    pub metadata: Arc<RunMetadata>,
    pub options: Option<Arc<Options>>,
}

impl Field {
    /// The shape this field materializes to.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Whether the field evolves in time (leading `t` dimension).
    pub fn evolves(&self) -> bool {
        self.dims.first().map(String::as_str) == Some(TIME_DIM)
    }
}

/// A single logical dataset reconstructed from per-processor dump files.
///
/// Matches what a non-parallel run would have produced: one set of global
/// dimensions, every field variable concatenated across tiles (and across
/// restart sets along time), with run metadata and optional options/grid
/// context attached. Field data stays on disk until materialized.
#[derive(Debug, Clone)]
pub struct BoutDataset {
    pub(crate) dims: BTreeMap<String, usize>,
    pub(crate) fields: BTreeMap<String, Field>,
    pub(crate) metadata: Arc<RunMetadata>,
    pub(crate) options: Option<Arc<Options>>,
    pub(crate) grid_file: Option<PathBuf>,
    pub(crate) keep_xboundaries: bool,
    pub(crate) keep_yboundaries: bool,
    pub(crate) chunks: Option<usize>,
}

impl BoutDataset {
    /// Global dimension sizes.
    pub fn sizes(&self) -> &BTreeMap<String, usize> {
        &self.dims
    }

    /// Length of one dimension, if present.
    pub fn dim_len(&self, name: &str) -> Option<usize> {
        self.dims.get(name).copied()
    }

    /// Whether any variable evolves in time.
    pub fn has_time(&self) -> bool {
        self.dims.contains_key(TIME_DIM)
    }

    /// Names of all variables, in name order.
    pub fn variable_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Look up a variable.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Iterate over all variables in name order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// The merged scalar run metadata.
    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// The attached options file, if one was supplied.
    pub fn options(&self) -> Option<&Options> {
        self.options.as_deref()
    }

    /// The attached grid file, if one was merged.
    pub fn grid_file(&self) -> Option<&PathBuf> {
        self.grid_file.as_ref()
    }

    /// Materialize a variable in full.
    ///
    /// This is the I/O-performing phase; everything before it only read
    /// shapes and attributes.
    pub fn materialize(&self, name: &str) -> CollectResult<ArrayD<f64>> {
        let field = self
            .fields
            .get(name)
            .ok_or_else(|| CollectError::input(format!("no variable '{name}'")))?;
        field.data.materialize(FileHandles::global())
    }

    /// Materialize a time-evolving variable restricted to `range` along `t`.
    pub fn materialize_trange(&self, name: &str, range: Range<usize>) -> CollectResult<ArrayD<f64>> {
        let field = self
            .fields
            .get(name)
            .ok_or_else(|| CollectError::input(format!("no variable '{name}'")))?;
        if !field.evolves() {
            return Err(CollectError::input(format!(
                "variable '{name}' has no time dimension"
            )));
        }
        field.data.materialize_trange(FileHandles::global(), range)
    }

    /// Add a derived field, attaching the dataset's metadata to it.
    ///
    /// Dimensions must match the dataset's existing sizes; new dimensions
    /// are adopted. Used by geometry transforms.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        dims: Vec<String>,
        data: LazyArray,
    ) -> CollectResult<()> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(CollectError::input(format!(
                "variable '{name}' already exists"
            )));
        }
        if dims.len() != data.shape().len() {
            return Err(CollectError::Shape(format!(
                "variable '{name}': {} dims named for rank-{} data",
                dims.len(),
                data.shape().len()
            )));
        }
        for (dim, &len) in dims.iter().zip(data.shape()) {
            match self.dims.get(dim) {
                Some(&existing) if existing != len => {
                    return Err(CollectError::Shape(format!(
                        "variable '{name}': dimension '{dim}' has length {len}, dataset has {existing}"
                    )));
                }
                Some(_) => {}
                None => {
                    self.dims.insert(dim.clone(), len);
                }
            }
        }
        self.fields.insert(
            name.clone(),
            Field {
                name,
                dims,
                data,
                metadata: Arc::clone(&self.metadata),
                options: self.options.clone(),
            },
        );
        Ok(())
    }
}

impl std::fmt::Display for BoutDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<BoutDataset>")?;
        write!(f, "Dimensions:")?;
        for (name, len) in &self.dims {
            write!(f, " {name}: {len}")?;
        }
        writeln!(f)?;
        writeln!(f, "Variables:")?;
        for field in self.fields.values() {
            writeln!(f, "  {} {:?} {:?}", field.name, field.dims, field.shape())?;
        }
        writeln!(f, "Metadata: {} scalars", self.metadata.len())?;
        if self.options.is_some() {
            writeln!(f, "Options: attached")?;
        }
        if let Some(grid) = &self.grid_file {
            writeln!(f, "Grid: {}", grid.display())?;
        }
        Ok(())
    }
}
