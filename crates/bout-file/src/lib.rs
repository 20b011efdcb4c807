//! Per-tile netCDF access for BOUT++ dump files.
//!
//! A parallel BOUT++ run writes one netCDF file per processor tile. This
//! crate owns the raw access to those files:
//!
//! - **Metadata extraction**: the decomposition scalars (`NXPE`, `NYPE`,
//!   `MXG`, `MYG`, `PE_XIND`, `PE_YIND`), dimension sizes, and per-variable
//!   layouts needed to place a tile in the processor grid, read without
//!   touching field data.
//! - **Handle caching**: a bounded LRU cache of open handles, since a run
//!   can involve more tiles than the OS allows open file descriptors.
//! - **Array reads**: whole-variable and time-slab reads into
//!   `ndarray::ArrayD<f64>`.
//!
//! Reconstruction of the global domain from tiles lives in the
//! `bout-collect` crate; this crate never interprets processor topology.

pub mod error;
pub mod handles;
pub mod meta;
pub mod read;
pub mod scalar;

pub use error::{FileError, FileResult};
pub use handles::{FileHandles, HandleStats, DEFAULT_HANDLE_CAPACITY};
pub use meta::{read_tile_meta, TileMeta, VarMeta};
pub use read::{read_variable, read_variable_trange};
pub use scalar::ScalarValue;
