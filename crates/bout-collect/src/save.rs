//! Writing a reconstructed dataset back to netCDF.
//!
//! The written file is a valid single-tile input to [`crate::open_boutdataset`]:
//! the decomposition scalars are rewritten to describe an unpartitioned
//! dataset (`NXPE = NYPE = 1`, no guard cells) and run metadata is stored
//! as typed global attributes. Time-evolving variables are streamed in
//! time chunks so the full dataset is never resident.

use std::ops::Range;
use std::path::{Path, PathBuf};

use bout_file::ScalarValue;
use ndarray::ArrayD;
use tracing::info;

use crate::dataset::{BoutDataset, Field};
use crate::error::{CollectError, CollectResult};

/// Options for [`BoutDataset::save_with`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Variables to save; `None` saves all of them.
    pub variables: Option<Vec<String>>,
    /// Save every time-dependent variable into its own file, named
    /// `<stem>_<variable><suffix>`, with all time-independent variables
    /// replicated into each.
    pub split_by_time_dependence: bool,
}

impl SaveOptions {
    /// Save only the named variables.
    pub fn variables(mut self, names: &[&str]) -> Self {
        self.variables = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Split the output by time dependence.
    pub fn split_by_time_dependence(mut self, split: bool) -> Self {
        self.split_by_time_dependence = split;
        self
    }
}

impl BoutDataset {
    /// Save all variables to a single netCDF file.
    pub fn save(&self, path: impl AsRef<Path>) -> CollectResult<Vec<PathBuf>> {
        self.save_with(path, &SaveOptions::default())
    }

    /// Save with explicit options, returning the paths written.
    pub fn save_with(
        &self,
        path: impl AsRef<Path>,
        options: &SaveOptions,
    ) -> CollectResult<Vec<PathBuf>> {
        let path = path.as_ref();
        let selected = self.select_fields(options.variables.as_deref())?;

        if options.split_by_time_dependence {
            let evolving: Vec<&Field> = selected.iter().copied().filter(|f| f.evolves()).collect();
            let steady: Vec<&Field> = selected.iter().copied().filter(|f| !f.evolves()).collect();
            if evolving.is_empty() {
                self.write_file(path, &selected)?;
                return Ok(vec![path.to_path_buf()]);
            }
            let mut written = Vec::new();
            for field in evolving {
                let var_path = split_path(path, &field.name);
                let mut fields = vec![field];
                fields.extend(steady.iter().copied());
                self.write_file(&var_path, &fields)?;
                written.push(var_path);
            }
            Ok(written)
        } else {
            self.write_file(path, &selected)?;
            Ok(vec![path.to_path_buf()])
        }
    }

    fn select_fields(&self, names: Option<&[String]>) -> CollectResult<Vec<&Field>> {
        match names {
            None => Ok(self.fields().collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.field(name)
                        .ok_or_else(|| CollectError::input(format!("no variable '{name}'")))
                })
                .collect(),
        }
    }

    fn write_file(&self, path: &Path, fields: &[&Field]) -> CollectResult<()> {
        let mut file = netcdf::create(path)?;

        // Dimensions, in first-use order across the selected fields.
        let mut dims: Vec<(String, usize)> = Vec::new();
        for field in fields {
            for (dim, &len) in field.dims.iter().zip(field.shape()) {
                if !dims.iter().any(|(name, _)| name == dim) {
                    dims.push((dim.clone(), len));
                }
            }
        }
        for (name, len) in &dims {
            file.add_dimension(name, *len)?;
        }

        write_metadata_attrs(&mut file, self)?;

        let chunk = self.chunks.unwrap_or(1);
        for field in fields {
            let dim_names: Vec<&str> = field.dims.iter().map(String::as_str).collect();
            let mut var = file.add_variable::<f64>(&field.name, &dim_names)?;

            if field.evolves() {
                let t_len = field.shape()[0];
                let mut start = 0;
                while start < t_len {
                    let stop = (start + chunk).min(t_len);
                    let slab = field
                        .data
                        .materialize_trange(bout_file::FileHandles::global(), start..stop)?;
                    put_slab(&mut var, &field.name, slab, start..stop)?;
                    start = stop;
                }
            } else {
                let data = field.data.materialize(bout_file::FileHandles::global())?;
                var.put_values(&array_to_vec(data), ..)?;
            }
        }

        info!(path = %path.display(), vars = fields.len(), "saved dataset");
        Ok(())
    }
}

/// Write the merged run metadata (and options, if attached) as global
/// attributes, with the decomposition scalars rewritten for the now
/// unpartitioned layout.
fn write_metadata_attrs(file: &mut netcdf::FileMut, dataset: &BoutDataset) -> CollectResult<()> {
    for (key, value) in dataset.metadata().iter() {
        match key.as_str() {
            // The saved file is one tile with no guard cells.
            "NXPE" | "NYPE" => file.add_attribute(key, 1i64)?,
            "MXG" | "MYG" => file.add_attribute(key, 0i64)?,
            _ => match value {
                ScalarValue::Int(v) => file.add_attribute(key, *v)?,
                ScalarValue::Float(v) => file.add_attribute(key, *v)?,
                ScalarValue::Text(v) => file.add_attribute(key, v.as_str())?,
            },
        };
    }
    if let Some(options) = dataset.options() {
        file.add_attribute("options", options.to_json().as_str())?;
    }
    Ok(())
}

/// Write one time slab at its offset along the leading dimension.
fn put_slab(
    var: &mut netcdf::VariableMut,
    name: &str,
    slab: ArrayD<f64>,
    range: Range<usize>,
) -> CollectResult<()> {
    let rank = slab.ndim();
    let data = array_to_vec(slab);
    match rank {
        1 => var.put_values(&data, range)?,
        2 => var.put_values(&data, (range, ..))?,
        3 => var.put_values(&data, (range, .., ..))?,
        4 => var.put_values(&data, (range, .., .., ..))?,
        _ => {
            return Err(CollectError::UnsupportedDimensionality {
                operation: "save",
                dims: vec![format!("{name}: rank {rank}")],
            })
        }
    };
    Ok(())
}

/// Row-major copy of an array's elements.
pub(crate) fn array_to_vec(arr: ArrayD<f64>) -> Vec<f64> {
    match arr.as_slice() {
        Some(slice) => slice.to_vec(),
        None => arr.iter().copied().collect(),
    }
}

/// `<stem>_<variable><suffix>` next to the requested path.
fn split_path(path: &Path, var: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "boutdata".to_string());
    let suffix = path
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "nc".to_string());
    let name = format!("{stem}_{var}.{suffix}");
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path_naming() {
        assert_eq!(
            split_path(Path::new("/out/boutdata.nc"), "T"),
            PathBuf::from("/out/boutdata_T.nc")
        );
        assert_eq!(
            split_path(Path::new("result.nc"), "n"),
            PathBuf::from("result_n.nc")
        );
    }

    #[test]
    fn test_save_options_builder() {
        let options = SaveOptions::default()
            .variables(&["n", "T"])
            .split_by_time_dependence(true);
        assert_eq!(
            options.variables,
            Some(vec!["n".to_string(), "T".to_string()])
        );
        assert!(options.split_by_time_dependence);
    }
}
