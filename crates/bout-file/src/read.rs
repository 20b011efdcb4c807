//! Whole-variable and time-slab reads into dynamic-rank arrays.

use ndarray::{ArrayD, IxDyn};
use std::ops::Range;

use crate::error::{FileError, FileResult};

fn variable<'f>(file: &'f netcdf::File, name: &str) -> FileResult<netcdf::Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| FileError::MissingVariable(name.to_string()))
}

fn into_array(name: &str, shape: Vec<usize>, data: Vec<f64>) -> FileResult<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| FileError::ShapeMismatch {
        var: name.to_string(),
        detail: e.to_string(),
    })
}

/// Read a full variable as `f64`, preserving its dimension order.
pub fn read_variable(file: &netcdf::File, name: &str) -> FileResult<ArrayD<f64>> {
    let var = variable(file, name)?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let data: Vec<f64> = var.get_values(..)?;
    into_array(name, shape, data)
}

/// Read a variable restricted to `range` along its leading dimension.
///
/// Supported ranks form a closed set (1 to 4, the dump-file layouts); any
/// other rank is an explicit error rather than a fall-through.
pub fn read_variable_trange(
    file: &netcdf::File,
    name: &str,
    range: Range<usize>,
) -> FileResult<ArrayD<f64>> {
    let var = variable(file, name)?;
    let mut shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let rank = shape.len();
    let data: Vec<f64> = match rank {
        1 => var.get_values(range.clone())?,
        2 => var.get_values((range.clone(), ..))?,
        3 => var.get_values((range.clone(), .., ..))?,
        4 => var.get_values((range.clone(), .., .., ..))?,
        _ => {
            return Err(FileError::UnsupportedRank {
                var: name.to_string(),
                rank,
            })
        }
    };
    shape[0] = range.len();
    into_array(name, shape, data)
}
