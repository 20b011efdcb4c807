//! Deferred read plans for reconstructed variables.
//!
//! Assembly never reads field data: it builds a [`LazyArray`] plan whose
//! leaves name a variable in one tile file together with the guard-cell
//! ranges to keep, and whose interior nodes concatenate along one axis.
//! Building a plan is pure; `materialize*` is the only phase that performs
//! I/O, routed through the shared file-handle cache.

use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bout_file::{read_variable, read_variable_trange, FileHandles};

use crate::error::{CollectError, CollectResult};

/// A deferred array: either a trimmed slab of one tile variable, or a
/// concatenation of sub-plans along one axis.
#[derive(Debug, Clone)]
pub enum LazyArray {
    Slab {
        path: PathBuf,
        var: String,
        /// Index ranges to keep, one per dimension of the on-disk variable.
        keep: Vec<Range<usize>>,
        shape: Vec<usize>,
    },
    Concat {
        axis: usize,
        parts: Vec<LazyArray>,
        shape: Vec<usize>,
    },
    /// Already-computed values (derived geometry fields). Cheap to clone.
    Values { data: Arc<ArrayD<f64>> },
}

impl LazyArray {
    /// Plan a trimmed read of one tile variable. Pure; no I/O.
    pub fn slab(path: PathBuf, var: impl Into<String>, keep: Vec<Range<usize>>) -> Self {
        let shape = keep.iter().map(|r| r.len()).collect();
        Self::Slab {
            path,
            var: var.into(),
            keep,
            shape,
        }
    }

    /// Plan a concatenation along `axis`. Pure; no I/O.
    ///
    /// All parts must agree on every other axis length.
    pub fn concat(axis: usize, parts: Vec<LazyArray>) -> CollectResult<Self> {
        let first = parts
            .first()
            .ok_or_else(|| CollectError::Shape("cannot concatenate zero parts".to_string()))?;
        let mut shape = first.shape().to_vec();
        if axis >= shape.len() {
            return Err(CollectError::Shape(format!(
                "concatenation axis {axis} out of range for shape {shape:?}"
            )));
        }
        for part in &parts[1..] {
            let other = part.shape();
            if other.len() != shape.len()
                || other
                    .iter()
                    .zip(shape.iter())
                    .enumerate()
                    .any(|(i, (a, b))| i != axis && a != b)
            {
                return Err(CollectError::Shape(format!(
                    "cannot concatenate shapes {shape:?} and {other:?} along axis {axis}"
                )));
            }
            shape[axis] += other[axis];
        }
        if parts.len() == 1 {
            return Ok(parts.into_iter().next().expect("one part"));
        }
        Ok(Self::Concat { axis, parts, shape })
    }

    /// Wrap already-computed values. Pure.
    pub fn values(data: ArrayD<f64>) -> Self {
        Self::Values {
            data: Arc::new(data),
        }
    }

    /// The shape this plan materializes to. Pure.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Slab { shape, .. } | Self::Concat { shape, .. } => shape,
            Self::Values { data } => data.shape(),
        }
    }

    /// Materialize the full array. Performs I/O through `handles`.
    pub fn materialize(&self, handles: &Mutex<FileHandles>) -> CollectResult<ArrayD<f64>> {
        match self {
            Self::Slab {
                path, var, keep, ..
            } => {
                let mut guard = handles.lock().expect("file-handle cache poisoned");
                let raw = guard.with_file(path, |file| read_variable(file, var))?;
                Ok(apply_keep(raw, keep))
            }
            Self::Concat { axis, parts, .. } => {
                let arrays: Vec<ArrayD<f64>> = parts
                    .iter()
                    .map(|p| p.materialize(handles))
                    .collect::<CollectResult<_>>()?;
                concat_arrays(*axis, &arrays)
            }
            Self::Values { data } => Ok((**data).clone()),
        }
    }

    /// Materialize only `range` along the leading (time) axis.
    ///
    /// This is the out-of-core path used by streaming writes: one time
    /// slab is resident at a time no matter how many tiles or sets the
    /// plan spans.
    pub fn materialize_trange(
        &self,
        handles: &Mutex<FileHandles>,
        range: Range<usize>,
    ) -> CollectResult<ArrayD<f64>> {
        let extent = self.shape().first().copied().ok_or_else(|| {
            CollectError::Shape("cannot take a time range of a scalar".to_string())
        })?;
        if range.is_empty() || range.end > extent {
            return Err(CollectError::Shape(format!(
                "time range {range:?} invalid for leading extent {extent}"
            )));
        }
        match self {
            Self::Slab {
                path, var, keep, ..
            } => {
                // Compose the request with the planned keep-range.
                let on_disk = (keep[0].start + range.start)..(keep[0].start + range.end);
                let mut rest = keep.to_vec();
                rest[0] = 0..range.len();
                let mut guard = handles.lock().expect("file-handle cache poisoned");
                let raw =
                    guard.with_file(path, |file| read_variable_trange(file, var, on_disk))?;
                Ok(apply_keep(raw, &rest))
            }
            Self::Concat { axis: 0, parts, .. } => {
                let mut arrays = Vec::new();
                let mut offset = 0;
                for part in parts {
                    let len = part.shape()[0];
                    let lo = range.start.max(offset);
                    let hi = range.end.min(offset + len);
                    if lo < hi {
                        arrays.push(
                            part.materialize_trange(handles, (lo - offset)..(hi - offset))?,
                        );
                    }
                    offset += len;
                }
                concat_arrays(0, &arrays)
            }
            Self::Concat { axis, parts, .. } => {
                let arrays: Vec<ArrayD<f64>> = parts
                    .iter()
                    .map(|p| p.materialize_trange(handles, range.clone()))
                    .collect::<CollectResult<_>>()?;
                concat_arrays(*axis, &arrays)
            }
            Self::Values { data } => Ok(data
                .slice_axis(Axis(0), Slice::from(range))
                .to_owned()),
        }
    }
}

fn concat_arrays(axis: usize, arrays: &[ArrayD<f64>]) -> CollectResult<ArrayD<f64>> {
    match arrays.len() {
        0 => Err(CollectError::Shape(
            "nothing to concatenate".to_string(),
        )),
        1 => Ok(arrays[0].clone()),
        _ => {
            let views: Vec<ArrayViewD<f64>> = arrays.iter().map(ArrayD::view).collect();
            Ok(ndarray::concatenate(Axis(axis), &views)?)
        }
    }
}

fn apply_keep(arr: ArrayD<f64>, keep: &[Range<usize>]) -> ArrayD<f64> {
    let untrimmed = keep
        .iter()
        .zip(arr.shape())
        .all(|(r, &len)| r.start == 0 && r.end == len);
    if untrimmed {
        return arr;
    }
    arr.slice_each_axis(|ax| {
        let r = &keep[ax.axis.index()];
        Slice::from(r.start..r.end)
    })
    .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_concat_shape_arithmetic() {
        let a = LazyArray::Slab {
            path: PathBuf::from("a.nc"),
            var: "n".into(),
            keep: vec![0..3, 0..4],
            shape: vec![3, 4],
        };
        let b = LazyArray::Slab {
            path: PathBuf::from("b.nc"),
            var: "n".into(),
            keep: vec![0..3, 0..2],
            shape: vec![3, 2],
        };
        let cat = LazyArray::concat(1, vec![a, b]).unwrap();
        assert_eq!(cat.shape(), &[3, 6]);
    }

    #[test]
    fn test_concat_rejects_mismatched_shapes() {
        let a = LazyArray::Slab {
            path: PathBuf::from("a.nc"),
            var: "n".into(),
            keep: vec![0..3, 0..4],
            shape: vec![3, 4],
        };
        let b = LazyArray::Slab {
            path: PathBuf::from("b.nc"),
            var: "n".into(),
            keep: vec![0..2, 0..4],
            shape: vec![2, 4],
        };
        assert!(LazyArray::concat(1, vec![a, b]).is_err());
    }

    #[test]
    fn test_single_part_concat_collapses() {
        let a = LazyArray::Slab {
            path: PathBuf::from("a.nc"),
            var: "n".into(),
            keep: vec![0..3],
            shape: vec![3],
        };
        let cat = LazyArray::concat(0, vec![a]).unwrap();
        assert!(matches!(cat, LazyArray::Slab { .. }));
    }

    #[test]
    fn test_apply_keep_trims() {
        let arr = ArrayD::from_shape_vec(
            IxDyn(&[4, 4]),
            (0..16).map(f64::from).collect(),
        )
        .unwrap();
        let trimmed = apply_keep(arr, &[1..3, 0..4]);
        assert_eq!(trimmed.shape(), &[2, 4]);
        assert_eq!(trimmed[[0, 0]], 4.0);
    }
}
