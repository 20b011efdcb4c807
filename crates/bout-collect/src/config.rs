//! Open options for dataset reconstruction.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CollectError, CollectResult};

/// Default dump-file prefix (`<prefix>.<index>.nc`).
pub const DEFAULT_PREFIX: &str = "BOUT.dmp";

/// Options controlling how a set of dump files is opened and reconstructed.
///
/// ```ignore
/// let ds = OpenOptions::new("data/BOUT.dmp.*.nc")
///     .input_file("data/BOUT.inp")
///     .keep_xboundaries(true)
///     .open()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOptions {
    /// File, directory, or glob pattern naming the dump files.
    pub datapath: String,

    /// Dump filename prefix. `None` means the default `BOUT.dmp`; setting
    /// it explicitly also disambiguates patterns polluted by foreign files.
    pub prefix: Option<String>,

    /// Options (`BOUT.inp`) file to parse and attach.
    pub input_file: Option<PathBuf>,

    /// Grid file whose spatial fields are merged into the dataset.
    pub grid_file: Option<PathBuf>,

    /// Geometry transform (by registered name) applied after assembly.
    pub geometry: Option<String>,

    /// Keep guard cells on the x domain boundaries.
    ///
    /// Interior guard cells are always trimmed; this only controls the
    /// cells on the global lower/upper x edges. Dropped by default.
    pub keep_xboundaries: bool,

    /// Keep guard cells on the y domain boundaries. Dropped by default.
    pub keep_yboundaries: bool,

    /// Number of time points materialized per write slab when saving.
    /// `None` streams one time point at a time.
    pub chunks: Option<usize>,
}

impl OpenOptions {
    /// Create options for the given datapath with defaults everywhere else.
    pub fn new(datapath: impl Into<String>) -> Self {
        Self {
            datapath: datapath.into(),
            prefix: None,
            input_file: None,
            grid_file: None,
            geometry: None,
            keep_xboundaries: false,
            keep_yboundaries: false,
            chunks: None,
        }
    }

    /// Set the dump filename prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Attach a parsed options file.
    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_file = Some(path.into());
        self
    }

    /// Merge a grid file's spatial fields.
    pub fn grid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.grid_file = Some(path.into());
        self
    }

    /// Apply a registered geometry transform after assembly.
    pub fn geometry(mut self, name: impl Into<String>) -> Self {
        self.geometry = Some(name.into());
        self
    }

    /// Keep guard cells on the x domain boundaries.
    pub fn keep_xboundaries(mut self, keep: bool) -> Self {
        self.keep_xboundaries = keep;
        self
    }

    /// Keep guard cells on the y domain boundaries.
    pub fn keep_yboundaries(mut self, keep: bool) -> Self {
        self.keep_yboundaries = keep;
        self
    }

    /// Set the time-chunk size used by streaming writes.
    pub fn chunks(mut self, chunks: usize) -> Self {
        self.chunks = Some(chunks);
        self
    }

    /// The effective dump-file prefix.
    pub fn effective_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    /// Validate the option combination.
    pub fn validate(&self) -> CollectResult<()> {
        if self.datapath.is_empty() {
            return Err(CollectError::configuration("datapath must not be empty"));
        }
        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() {
                return Err(CollectError::configuration("prefix must not be empty"));
            }
        }
        if self.chunks == Some(0) {
            return Err(CollectError::configuration("chunks must be > 0"));
        }
        Ok(())
    }

    /// Open and reconstruct the dataset described by these options.
    pub fn open(&self) -> CollectResult<crate::dataset::BoutDataset> {
        crate::open_with(self)
    }
}
