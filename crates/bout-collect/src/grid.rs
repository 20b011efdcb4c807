//! Merging grid-file fields into a reconstructed dataset.
//!
//! A grid file is a single netCDF file with purely spatial dimensions.
//! Its variables are attached to the dataset as extra (lazy) fields when
//! their dimensions line up; anything incompatible is dropped with a
//! warning, never silently and never fatally.

use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;

use bout_file::{read_tile_meta, FileHandles};
use tracing::{info, warn};

use crate::dataset::{BoutDataset, TIME_DIM};
use crate::error::CollectResult;
use crate::lazy::LazyArray;

/// Merge the variables of `gridpath` into `dataset`.
pub(crate) fn merge_grid_file(
    dataset: &mut BoutDataset,
    handles: &Mutex<FileHandles>,
    gridpath: &Path,
) -> CollectResult<()> {
    let grid = read_tile_meta(handles, gridpath, 0)?;

    let mut merged = 0usize;
    for var in &grid.variables {
        if var.dims.iter().any(|d| d == TIME_DIM) {
            warn!(var = %var.name, "dropping grid variable with a time dimension");
            continue;
        }
        let compatible = var.dims.iter().zip(&var.shape).all(|(dim, &len)| {
            match dataset.dim_len(dim) {
                Some(existing) => existing == len,
                // Dimensions the dataset doesn't have yet are adopted.
                None => true,
            }
        });
        if !compatible {
            warn!(
                var = %var.name,
                dims = ?var.dims,
                shape = ?var.shape,
                "dropping grid variable incompatible with the dataset's spatial dimensions"
            );
            continue;
        }
        if dataset.field(&var.name).is_some() {
            warn!(var = %var.name, "dropping grid variable shadowed by a dump variable");
            continue;
        }

        let keep: Vec<Range<usize>> = var.shape.iter().map(|&len| 0..len).collect();
        dataset.add_field(
            var.name.clone(),
            var.dims.clone(),
            LazyArray::slab(grid.path.clone(), &var.name, keep),
        )?;
        merged += 1;
    }

    dataset.grid_file = Some(gridpath.to_path_buf());
    info!(
        path = %gridpath.display(),
        merged,
        dropped = grid.variables.len() - merged,
        "merged grid file"
    );
    Ok(())
}
