//! Bounded LRU cache of open netCDF file handles.
//!
//! A decomposed run can consist of more dump files than the OS allows open
//! file descriptors, so every read goes through this cache: the handle for a
//! tile is opened on first use and the least-recently-used handle is closed
//! once the capacity is reached.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::debug;

use crate::error::FileResult;

/// Default number of simultaneously open dump files.
pub const DEFAULT_HANDLE_CAPACITY: usize = 256;

/// Environment variable overriding the default handle capacity.
pub const HANDLE_CAPACITY_ENV: &str = "BOUT_FILE_CACHE_SIZE";

/// Statistics about the file-handle cache.
#[derive(Debug, Clone, Default)]
pub struct HandleStats {
    pub hits: u64,
    pub misses: u64,
    pub open: usize,
    pub evictions: u64,
}

impl HandleStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of open read-only netCDF handles, keyed by path.
pub struct FileHandles {
    cache: LruCache<PathBuf, netcdf::File>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl FileHandles {
    /// Create a cache holding at most `capacity` open handles.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Run `f` against the open handle for `path`, opening it if needed.
    ///
    /// Opening may evict the least-recently-used handle, which closes the
    /// underlying file transparently to its other users.
    pub fn with_file<R>(
        &mut self,
        path: &Path,
        f: impl FnOnce(&netcdf::File) -> FileResult<R>,
    ) -> FileResult<R> {
        if self.cache.contains(path) {
            self.hits += 1;
        } else {
            self.misses += 1;
            let file = netcdf::open(path)?;
            debug!(path = %path.display(), "opened dump file");
            if self.cache.len() == self.cache.cap().get() {
                if let Some((evicted, _)) = self.cache.pop_lru() {
                    self.evictions += 1;
                    debug!(path = %evicted.display(), "evicted dump file handle");
                }
            }
            self.cache.put(path.to_path_buf(), file);
        }
        let file = self
            .cache
            .get(path)
            .expect("handle just inserted or found");
        f(file)
    }

    /// Close every open handle.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of currently open handles.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no handles are open.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> HandleStats {
        HandleStats {
            hits: self.hits,
            misses: self.misses,
            open: self.cache.len(),
            evictions: self.evictions,
        }
    }

    /// The process-wide handle cache.
    ///
    /// Sized from `BOUT_FILE_CACHE_SIZE` when set, otherwise
    /// [`DEFAULT_HANDLE_CAPACITY`].
    pub fn global() -> &'static Mutex<FileHandles> {
        static GLOBAL: OnceLock<Mutex<FileHandles>> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let capacity = std::env::var(HANDLE_CAPACITY_ENV)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HANDLE_CAPACITY);
            Mutex::new(FileHandles::new(capacity))
        })
    }
}

impl std::fmt::Debug for FileHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandles")
            .field("open", &self.cache.len())
            .field("capacity", &self.cache.cap().get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_empty_nc(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = netcdf::create(&path).unwrap();
        file.add_dimension("x", 1).unwrap();
        drop(file);
        path
    }

    #[test]
    fn test_open_hit_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_empty_nc(dir.path(), "a.nc");

        let mut handles = FileHandles::new(4);
        handles
            .with_file(&path, |f| Ok(f.dimension("x").is_some()))
            .unwrap();
        handles
            .with_file(&path, |f| Ok(f.dimension("x").is_some()))
            .unwrap();

        let stats = handles.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.open, 1);
    }

    #[test]
    fn test_lru_eviction_closes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..4)
            .map(|i| write_empty_nc(dir.path(), &format!("tile{i}.nc")))
            .collect();

        let mut handles = FileHandles::new(2);
        for path in &paths {
            handles.with_file(path, |_| Ok(())).unwrap();
        }

        let stats = handles.stats();
        assert_eq!(stats.open, 2);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.misses, 4);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut handles = FileHandles::new(2);
        let result = handles.with_file(Path::new("/nonexistent/tile.nc"), |_| Ok(()));
        assert!(result.is_err());
        assert!(handles.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let mut stats = HandleStats::default();
        assert!((stats.hit_rate() - 0.0).abs() < f64::EPSILON);
        stats.hits = 3;
        stats.misses = 1;
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
