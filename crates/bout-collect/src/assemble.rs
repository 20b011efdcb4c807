//! Assembly of tile files into one lazy dataset.
//!
//! For one set: tiles are grouped by `pe_yind`, concatenated along x in
//! ascending `pe_xind` after guard trimming, and the resulting rows
//! concatenated along y. Variables without spatial dimensions are taken
//! from the root tile. Across sets, time-evolving variables are
//! concatenated along `t`. Everything here builds [`LazyArray`] plans;
//! no field data is read.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use bout_file::{TileMeta, VarMeta};
use tracing::{debug, info};

use crate::config::OpenOptions;
use crate::dataset::{BoutDataset, Field, TIME_DIM, X_DIM, Y_DIM};
use crate::error::{CollectError, CollectResult};
use crate::lazy::LazyArray;
use crate::metadata::RunMetadata;
use crate::topology::{TilePosition, Topology, TrimPlan};

/// The assembled plan of one set.
struct SetPlan {
    topology: Topology,
    /// Dimension sizes of the assembled set (including `t` if evolving).
    dims: BTreeMap<String, usize>,
    /// Variable name -> (dims, plan).
    vars: BTreeMap<String, (Vec<String>, LazyArray)>,
    metadata: RunMetadata,
}

/// Trim-adjusted keep-ranges for one variable of one tile.
fn keep_ranges(tile: &TileMeta, var: &VarMeta, trim: &TrimPlan) -> CollectResult<Vec<Range<usize>>> {
    var.dims
        .iter()
        .zip(&var.shape)
        .map(|(dim, &len)| {
            let (lower, upper) = match dim.as_str() {
                X_DIM => (trim.x_lower, trim.x_upper),
                Y_DIM => (trim.y_lower, trim.y_upper),
                _ => (0, 0),
            };
            if lower + upper >= len {
                return Err(CollectError::metadata(format!(
                    "{}: trimming {lower}+{upper} guard cells from '{}' leaves no '{dim}' interior (extent {len})",
                    tile.path.display(),
                    var.name
                )));
            }
            Ok(lower..len - upper)
        })
        .collect()
}

/// Cross-tile consistency checks for one set.
///
/// Everything a broken decomposition can get wrong is rejected here, at
/// open time, so materialization can never silently produce misaligned
/// data.
fn check_set_consistency(
    tiles: &[TileMeta],
    positions: &[TilePosition],
) -> CollectResult<()> {
    let first = &tiles[0];

    for tile in tiles {
        if tile.mxg != first.mxg || tile.myg != first.myg {
            return Err(CollectError::metadata(format!(
                "{}: guard widths ({}, {}) disagree with ({}, {}) in {}",
                tile.path.display(),
                tile.mxg,
                tile.myg,
                first.mxg,
                first.myg,
                first.path.display()
            )));
        }
        let layouts = |t: &TileMeta| -> Vec<(String, Vec<String>)> {
            t.variables
                .iter()
                .map(|v| (v.name.clone(), v.dims.clone()))
                .collect()
        };
        if layouts(tile) != layouts(first) {
            return Err(CollectError::metadata(format!(
                "{}: variable layout disagrees with {}",
                tile.path.display(),
                first.path.display()
            )));
        }
        // Dimensions not decomposed over processors must agree everywhere.
        for (dim, &len) in &first.dims {
            if dim == X_DIM || dim == Y_DIM {
                continue;
            }
            if tile.dims.get(dim) != Some(&len) {
                return Err(CollectError::metadata(format!(
                    "{}: dimension '{dim}' disagrees with {} ({:?} vs {len})",
                    tile.path.display(),
                    first.path.display(),
                    tile.dims.get(dim)
                )));
            }
        }
    }

    // Tiles sharing a processor-grid column must agree on local x extent;
    // tiles sharing a row on local y extent.
    let mut col_x: BTreeMap<usize, (usize, &TileMeta)> = BTreeMap::new();
    let mut row_y: BTreeMap<usize, (usize, &TileMeta)> = BTreeMap::new();
    for (tile, pos) in tiles.iter().zip(positions) {
        if let Some(&x_len) = tile.dims.get(X_DIM) {
            match col_x.get(&pos.xind) {
                None => {
                    col_x.insert(pos.xind, (x_len, tile));
                }
                Some(&(expected, other)) if expected != x_len => {
                    return Err(CollectError::metadata(format!(
                        "{}: local x extent {x_len} disagrees with {expected} in {} (column {})",
                        tile.path.display(),
                        other.path.display(),
                        pos.xind
                    )));
                }
                Some(_) => {}
            }
        }
        if let Some(&y_len) = tile.dims.get(Y_DIM) {
            match row_y.get(&pos.yind) {
                None => {
                    row_y.insert(pos.yind, (y_len, tile));
                }
                Some(&(expected, other)) if expected != y_len => {
                    return Err(CollectError::metadata(format!(
                        "{}: local y extent {y_len} disagrees with {expected} in {} (row {})",
                        tile.path.display(),
                        other.path.display(),
                        pos.yind
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Build the lazy plan for one set of tiles.
fn plan_set(tiles: &[TileMeta], opts: &OpenOptions) -> CollectResult<SetPlan> {
    // Scalar merge first: it reports conflicting run metadata (including
    // guard widths and grid shape) with better messages than the
    // structural checks below.
    let metadata = RunMetadata::merge_set(tiles)?;

    let (topology, positions) = Topology::resolve(tiles)?;
    check_set_consistency(tiles, &positions)?;

    // Row-major grid: tile index and trim plan per processor position.
    let mut grid: Vec<Option<(usize, TrimPlan)>> = vec![None; topology.nxpe * topology.nype];
    for (i, (tile, pos)) in tiles.iter().zip(&positions).enumerate() {
        let trim = topology.trim_plan(
            *pos,
            tile.mxg,
            tile.myg,
            opts.keep_xboundaries,
            opts.keep_yboundaries,
        );
        grid[topology.rank(*pos)] = Some((i, trim));
    }
    let at = |xind: usize, yind: usize| -> (usize, TrimPlan) {
        grid[yind * topology.nxpe + xind].expect("topology resolution guarantees a full grid")
    };

    let root = &tiles[at(0, 0).0];
    let mut vars: BTreeMap<String, (Vec<String>, LazyArray)> = BTreeMap::new();
    for var in &root.variables {
        let has_x = var.dim_index(X_DIM).is_some();
        let has_y = var.dim_index(Y_DIM).is_some();

        let slab = |xind: usize, yind: usize| -> CollectResult<LazyArray> {
            let (i, trim) = at(xind, yind);
            let tile = &tiles[i];
            let keep = keep_ranges(tile, var, &trim)?;
            Ok(LazyArray::slab(tile.path.clone(), &var.name, keep))
        };

        let plan = match (has_x, has_y) {
            (true, true) => {
                let x_axis = var.dim_index(X_DIM).expect("checked");
                let y_axis = var.dim_index(Y_DIM).expect("checked");
                let rows: Vec<LazyArray> = (0..topology.nype)
                    .map(|yind| {
                        let parts: Vec<LazyArray> = (0..topology.nxpe)
                            .map(|xind| slab(xind, yind))
                            .collect::<CollectResult<_>>()?;
                        LazyArray::concat(x_axis, parts)
                    })
                    .collect::<CollectResult<_>>()?;
                LazyArray::concat(y_axis, rows)?
            }
            (true, false) => {
                let x_axis = var.dim_index(X_DIM).expect("checked");
                let parts: Vec<LazyArray> = (0..topology.nxpe)
                    .map(|xind| slab(xind, 0))
                    .collect::<CollectResult<_>>()?;
                LazyArray::concat(x_axis, parts)?
            }
            (false, true) => {
                let y_axis = var.dim_index(Y_DIM).expect("checked");
                let parts: Vec<LazyArray> = (0..topology.nype)
                    .map(|yind| slab(0, yind))
                    .collect::<CollectResult<_>>()?;
                LazyArray::concat(y_axis, parts)?
            }
            // No spatial dims: identical on every tile, take the root's.
            (false, false) => slab(0, 0)?,
        };
        vars.insert(var.name.clone(), (var.dims.clone(), plan));
    }

    // Dimension sizes of the assembled set, derived from the planned
    // variables so unused file dimensions don't leak through.
    let mut dims: BTreeMap<String, usize> = BTreeMap::new();
    for (name, (var_dims, plan)) in &vars {
        for (dim, &len) in var_dims.iter().zip(plan.shape()) {
            match dims.get(dim) {
                None => {
                    dims.insert(dim.clone(), len);
                }
                Some(&existing) if existing != len => {
                    return Err(CollectError::metadata(format!(
                        "variable '{name}': dimension '{dim}' assembles to {len}, \
                         but another variable assembles it to {existing}"
                    )));
                }
                Some(_) => {}
            }
        }
    }

    debug!(
        nxpe = topology.nxpe,
        nype = topology.nype,
        vars = vars.len(),
        "planned dump set"
    );
    Ok(SetPlan {
        topology,
        dims,
        vars,
        metadata,
    })
}

/// Assemble all sets into one dataset, concatenating sets along time.
pub(crate) fn assemble(
    set_tiles: &[Vec<TileMeta>],
    opts: &OpenOptions,
) -> CollectResult<BoutDataset> {
    let plans: Vec<SetPlan> = set_tiles
        .iter()
        .map(|tiles| plan_set(tiles, opts))
        .collect::<CollectResult<_>>()?;
    let first = plans.first().ok_or_else(|| CollectError::input("no dump sets"))?;

    for plan in &plans[1..] {
        if plan.topology != first.topology {
            return Err(CollectError::input(format!(
                "inconsistent topology across sets: ({}, {}) vs ({}, {})",
                plan.topology.nxpe, plan.topology.nype, first.topology.nxpe, first.topology.nype
            )));
        }
        let names = |p: &SetPlan| -> Vec<String> { p.vars.keys().cloned().collect() };
        if names(plan) != names(first) {
            return Err(CollectError::input(
                "sets do not contain the same variables".to_string(),
            ));
        }
        for (dim, &len) in &first.dims {
            if dim == TIME_DIM {
                continue;
            }
            if plan.dims.get(dim) != Some(&len) {
                return Err(CollectError::input(format!(
                    "dimension '{dim}' differs between sets ({:?} vs {len})",
                    plan.dims.get(dim)
                )));
            }
        }
    }

    let mut dims = first.dims.clone();
    if let Some(t_total) = plans
        .iter()
        .map(|p| p.dims.get(TIME_DIM).copied())
        .try_fold(0usize, |acc, t| t.map(|t| acc + t))
    {
        dims.insert(TIME_DIM.to_string(), t_total);
    }

    let metadata = Arc::new(RunMetadata::merge_sets(
        plans.iter().map(|p| p.metadata.clone()).collect(),
    ));

    let mut fields: BTreeMap<String, Field> = BTreeMap::new();
    for (name, (var_dims, _)) in &first.vars {
        let evolves = var_dims.first().map(String::as_str) == Some(TIME_DIM);
        let plan = if evolves && plans.len() > 1 {
            let parts: Vec<LazyArray> = plans
                .iter()
                .map(|p| p.vars[name].1.clone())
                .collect();
            LazyArray::concat(0, parts)?
        } else {
            first.vars[name].1.clone()
        };
        fields.insert(
            name.clone(),
            Field {
                name: name.clone(),
                dims: var_dims.clone(),
                data: plan,
                metadata: Arc::clone(&metadata),
                options: None,
            },
        );
    }

    info!(
        sets = plans.len(),
        vars = fields.len(),
        dims = ?dims,
        "assembled dataset"
    );
    Ok(BoutDataset {
        dims,
        fields,
        metadata,
        options: None,
        grid_file: None,
        keep_xboundaries: opts.keep_xboundaries,
        keep_yboundaries: opts.keep_yboundaries,
        chunks: opts.chunks,
    })
}
