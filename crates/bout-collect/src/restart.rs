//! Re-partitioning the final time slice into restart files.
//!
//! `to_restart` inverts the reconstruction for the last time point: the
//! assembled global arrays are split back into `nxpe * nype` tiles, with
//! interior guard cells refilled by overlap-slicing neighbour data out of
//! the global array. Domain-boundary guard cells cannot be invented, so a
//! dataset with non-zero guard widths must have been opened with
//! boundaries kept.

use ndarray::{ArrayD, Axis, Slice};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bout_file::ScalarValue;
use tracing::info;

use crate::dataset::{BoutDataset, DimLayout, TIME_DIM, X_DIM, Y_DIM};
use crate::error::{CollectError, CollectResult};
use crate::save::array_to_vec;

/// Options for [`BoutDataset::to_restart`].
#[derive(Debug, Clone, Default)]
pub struct RestartOptions {
    /// Processor-grid width; defaults to the run's original `NXPE`.
    pub nxpe: Option<usize>,
    /// Processor-grid height; defaults to the run's original `NYPE`.
    pub nype: Option<usize>,
    /// Require the original decomposition. Conflicts with `nxpe`/`nype`.
    pub original_splitting: bool,
}

impl RestartOptions {
    /// Request an explicit decomposition.
    pub fn decomposition(mut self, nxpe: usize, nype: usize) -> Self {
        self.nxpe = Some(nxpe);
        self.nype = Some(nype);
        self
    }

    /// Require the original decomposition.
    pub fn original_splitting(mut self, original: bool) -> Self {
        self.original_splitting = original;
        self
    }
}

/// The extent one tile covers along one axis of the global array.
fn tile_extent(
    axis: &str,
    global: usize,
    guard: usize,
    npe: usize,
) -> CollectResult<(usize, usize)> {
    let interior = global
        .checked_sub(2 * guard)
        .filter(|&i| i > 0)
        .ok_or_else(|| {
            CollectError::input(format!(
                "global {axis} extent {global} cannot hold 2x{guard} boundary cells"
            ))
        })?;
    if interior % npe != 0 {
        return Err(CollectError::input(format!(
            "{axis} interior extent {interior} does not divide into {npe} tiles"
        )));
    }
    Ok((interior / npe, interior / npe + 2 * guard))
}

impl BoutDataset {
    /// Write the final time slice as a set of restart files in `dir`,
    /// named `BOUT.restart.<rank>.nc`, returning the paths written.
    pub fn to_restart(
        &self,
        dir: impl AsRef<Path>,
        options: &RestartOptions,
    ) -> CollectResult<Vec<PathBuf>> {
        let dir = dir.as_ref();

        if options.original_splitting && (options.nxpe.is_some() || options.nype.is_some()) {
            return Err(CollectError::configuration(
                "inconsistent choices for domain decomposition: \
                 original_splitting excludes explicit nxpe/nype",
            ));
        }
        let original = |key: &str| self.metadata().get_int(key).map(|v| v as usize);
        let nxpe = options.nxpe.or_else(|| original("NXPE")).unwrap_or(1);
        let nype = options.nype.or_else(|| original("NYPE")).unwrap_or(1);
        let mxg = original("MXG").unwrap_or(0);
        let myg = original("MYG").unwrap_or(0);

        if mxg > 0 && !self.keep_xboundaries {
            return Err(CollectError::configuration(
                "restart export needs x boundary cells; open with keep_xboundaries",
            ));
        }
        if myg > 0 && !self.keep_yboundaries {
            return Err(CollectError::configuration(
                "restart export needs y boundary cells; open with keep_yboundaries",
            ));
        }

        let global_x = self
            .dim_len(X_DIM)
            .ok_or_else(|| CollectError::input("dataset has no x dimension"))?;
        let global_y = self
            .dim_len(Y_DIM)
            .ok_or_else(|| CollectError::input("dataset has no y dimension"))?;
        let (x_interior, x_local) = tile_extent(X_DIM, global_x, mxg, nxpe)?;
        let (y_interior, y_local) = tile_extent(Y_DIM, global_y, myg, nype)?;

        let t_last = match self.dim_len(TIME_DIM) {
            Some(0) => return Err(CollectError::input("dataset has an empty time dimension")),
            Some(len) => Some(len - 1),
            None => None,
        };

        // Materialize the final slice of every variable once; tiles below
        // only slice views out of these.
        let mut slices: BTreeMap<&str, (Vec<String>, ArrayD<f64>)> = BTreeMap::new();
        for field in self.fields() {
            let layout = DimLayout::classify("restart export", &field.dims)?;
            let (dims, data) = match layout {
                DimLayout::Scalar => continue,
                DimLayout::XY | DimLayout::XYZ => {
                    (field.dims.clone(), self.materialize(&field.name)?)
                }
                DimLayout::TimeTrace | DimLayout::TXY | DimLayout::TXYZ => {
                    let t_last = t_last.ok_or_else(|| {
                        CollectError::input(format!(
                            "variable '{}' evolves but the dataset has no time dimension",
                            field.name
                        ))
                    })?;
                    let slab = self.materialize_trange(&field.name, t_last..t_last + 1)?;
                    let dropped = slab.index_axis(Axis(0), 0).to_owned();
                    (field.dims[1..].to_vec(), dropped)
                }
            };
            slices.insert(field.name.as_str(), (dims, data));
        }

        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for yind in 0..nype {
            for xind in 0..nxpe {
                let rank = yind * nxpe + xind;
                let path = dir.join(format!("BOUT.restart.{rank}.nc"));
                self.write_restart_tile(
                    &path,
                    &slices,
                    RestartTile {
                        nxpe,
                        nype,
                        xind,
                        yind,
                        mxg,
                        myg,
                        x_range: (xind * x_interior, x_local),
                        y_range: (yind * y_interior, y_local),
                    },
                )?;
                written.push(path);
            }
        }

        info!(
            dir = %dir.display(),
            nxpe,
            nype,
            files = written.len(),
            "exported restart files"
        );
        Ok(written)
    }

    fn write_restart_tile(
        &self,
        path: &Path,
        slices: &BTreeMap<&str, (Vec<String>, ArrayD<f64>)>,
        tile: RestartTile,
    ) -> CollectResult<()> {
        let mut file = netcdf::create(path)?;

        // Per-tile dimensions, in first-use order.
        let mut dims: Vec<(String, usize)> = Vec::new();
        for (var_dims, data) in slices.values() {
            for (dim, &len) in var_dims.iter().zip(data.shape()) {
                let local = match dim.as_str() {
                    X_DIM => tile.x_range.1,
                    Y_DIM => tile.y_range.1,
                    _ => len,
                };
                if !dims.iter().any(|(name, _)| name == dim) {
                    dims.push((dim.clone(), local));
                }
            }
        }
        for (name, len) in &dims {
            file.add_dimension(name, *len)?;
        }

        for (key, value) in self.metadata().iter() {
            match key.as_str() {
                "NXPE" => file.add_attribute(key, tile.nxpe as i64)?,
                "NYPE" => file.add_attribute(key, tile.nype as i64)?,
                "MXG" => file.add_attribute(key, tile.mxg as i64)?,
                "MYG" => file.add_attribute(key, tile.myg as i64)?,
                _ => match value {
                    ScalarValue::Int(v) => file.add_attribute(key, *v)?,
                    ScalarValue::Float(v) => file.add_attribute(key, *v)?,
                    ScalarValue::Text(v) => file.add_attribute(key, v.as_str())?,
                },
            };
        }
        file.add_attribute("PE_XIND", tile.xind as i64)?;
        file.add_attribute("PE_YIND", tile.yind as i64)?;

        for (name, (var_dims, data)) in slices {
            let local = if var_dims.is_empty() {
                data.clone()
            } else {
                data.slice_each_axis(|ax| {
                    let (start, len) = match var_dims[ax.axis.index()].as_str() {
                        X_DIM => tile.x_range,
                        Y_DIM => tile.y_range,
                        _ => (0, ax.len),
                    };
                    Slice::from(start..start + len)
                })
                .to_owned()
            };
            let dim_names: Vec<&str> = var_dims.iter().map(String::as_str).collect();
            let mut var = file.add_variable::<f64>(name, &dim_names)?;
            var.put_values(&array_to_vec(local), ..)?;
        }
        Ok(())
    }
}

/// Placement of one restart tile in the requested decomposition.
#[derive(Debug, Clone, Copy)]
struct RestartTile {
    nxpe: usize,
    nype: usize,
    xind: usize,
    yind: usize,
    mxg: usize,
    myg: usize,
    /// (start, length) along the global x axis.
    x_range: (usize, usize),
    /// (start, length) along the global y axis.
    y_range: (usize, usize),
}
