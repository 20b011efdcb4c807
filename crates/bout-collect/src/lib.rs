//! Reconstruction of BOUT++ dump-file sets into one logical dataset.
//!
//! A parallel BOUT++ run decomposes its domain over a 2D processor grid
//! and writes one netCDF file per tile, guard cells included. This crate
//! reassembles those tiles into the dataset a non-parallel run would have
//! produced:
//!
//! ```text
//! open_boutdataset(datapath)
//!      │
//!      ├─► discovery: enumerate dump files, group into restart sets
//!      │
//!      ├─► metadata: read decomposition scalars and variable layouts
//!      │        (shapes and attributes only, never field data)
//!      │
//!      ├─► topology: place each tile, decide guard-cell trimming
//!      │
//!      ├─► assembly: build lazy concatenation plans (x, then y, then t)
//!      │
//!      ├─► attach merged metadata, options file, grid file
//!      │
//!      └─► optional geometry transform from the registry
//! ```
//!
//! Assembly is a pure planning phase: field data is only read when a
//! variable is materialized (or streamed out by `save`/`to_restart`),
//! through a process-wide bounded cache of open file handles. Runs too
//! large for memory are therefore loadable; `save` streams time-evolving
//! variables chunk by chunk.
//!
//! # Example
//!
//! ```ignore
//! use bout_collect::OpenOptions;
//!
//! let ds = OpenOptions::new("data/run*/BOUT.dmp.*.nc")
//!     .input_file("data/BOUT.inp")
//!     .keep_xboundaries(true)
//!     .open()?;
//!
//! let n = ds.materialize("n")?;
//! ds.save("collected.nc")?;
//! ```

pub mod assemble;
pub mod config;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod lazy;
pub mod metadata;
pub mod options;
pub mod restart;
pub mod save;
pub mod topology;

use std::sync::Arc;

use bout_file::{read_tile_meta, FileHandles, ScalarValue, TileMeta};

// Re-export commonly used types at crate root
pub use config::{OpenOptions, DEFAULT_PREFIX};
pub use dataset::{BoutDataset, DimLayout, Field, TIME_DIM, X_DIM, Y_DIM, Z_DIM};
pub use error::{CollectError, CollectResult};
pub use geometry::{default_registry, Coordinates, GeometryRegistry};
pub use lazy::LazyArray;
pub use metadata::RunMetadata;
pub use options::Options;
pub use restart::RestartOptions;
pub use save::SaveOptions;

/// Open a dump-file set with default options.
///
/// Equivalent to `OpenOptions::new(datapath).open()`. Idempotent: the same
/// files produce the same logical dataset, and nothing is touched beyond
/// opening file handles.
pub fn open_boutdataset(datapath: impl Into<String>) -> CollectResult<BoutDataset> {
    OpenOptions::new(datapath).open()
}

/// The full open pipeline behind [`OpenOptions::open`].
pub(crate) fn open_with(opts: &OpenOptions) -> CollectResult<BoutDataset> {
    opts.validate()?;
    let handles = FileHandles::global();

    let sets = discovery::discover(&opts.datapath, opts.effective_prefix(), opts.prefix.is_some())?;

    let mut set_tiles: Vec<Vec<TileMeta>> = sets
        .iter()
        .map(|set| {
            set.files
                .iter()
                .map(|f| read_tile_meta(handles, &f.path, f.index))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<_, _>>()?;

    // A previously saved dataset stores its options under an attribute;
    // pull that out of the scalar record before metadata merging.
    let mut stored_options: Option<String> = None;
    for tiles in &mut set_tiles {
        for tile in tiles {
            if let Some(ScalarValue::Text(json)) = tile.scalars.remove("options") {
                stored_options.get_or_insert(json);
            }
        }
    }

    let mut ds = assemble::assemble(&set_tiles, opts)?;

    let parsed = match (&opts.input_file, stored_options) {
        (Some(path), _) => Some(Options::from_file(path)?),
        (None, Some(json)) => Some(Options::from_json(&json)?),
        (None, None) => None,
    };
    if let Some(options) = parsed {
        let options = Arc::new(options);
        for field in ds.fields.values_mut() {
            field.options = Some(Arc::clone(&options));
        }
        ds.options = Some(options);
    }

    if let Some(gridpath) = &opts.grid_file {
        grid::merge_grid_file(&mut ds, handles, gridpath)?;
    }

    if let Some(name) = &opts.geometry {
        ds = default_registry().apply(name, ds, None)?;
    }

    Ok(ds)
}
