//! Registry of geometry transforms.
//!
//! A geometry transform takes a reconstructed dataset and adds derived
//! coordinate or geometry fields (for example real-space coordinates from
//! an attached grid file). Transforms are registered by name at runtime
//! and applied by name; nothing is registered implicitly and nothing
//! persists past process exit.
//!
//! The registry is an ordinary value so callers (and tests) can inject
//! isolated instances; [`default_registry`] is the process-wide
//! convenience instance used by `OpenOptions::geometry`.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::info;

use crate::dataset::BoutDataset;
use crate::error::{CollectError, CollectResult};

/// Optional coordinate-name overrides passed to a transform.
pub type Coordinates = BTreeMap<String, String>;

/// A named transform adding derived fields to a dataset.
pub type GeometryTransform =
    Arc<dyn Fn(BoutDataset, Option<&Coordinates>) -> CollectResult<BoutDataset> + Send + Sync>;

/// Name-indexed registry of geometry transforms.
#[derive(Default)]
pub struct GeometryRegistry {
    inner: RwLock<BTreeMap<String, GeometryTransform>>,
}

impl GeometryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform under `name`.
    ///
    /// Fails if the name is taken; use [`Self::register_or_replace`] to
    /// overwrite deliberately.
    pub fn register<F>(&self, name: impl Into<String>, transform: F) -> CollectResult<()>
    where
        F: Fn(BoutDataset, Option<&Coordinates>) -> CollectResult<BoutDataset>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let mut inner = self.inner.write().expect("geometry registry poisoned");
        if inner.contains_key(&name) {
            return Err(CollectError::GeometryExists(name));
        }
        inner.insert(name, Arc::new(transform));
        Ok(())
    }

    /// Register a transform, replacing any existing entry of that name.
    pub fn register_or_replace<F>(&self, name: impl Into<String>, transform: F)
    where
        F: Fn(BoutDataset, Option<&Coordinates>) -> CollectResult<BoutDataset>
            + Send
            + Sync
            + 'static,
    {
        let mut inner = self.inner.write().expect("geometry registry poisoned");
        inner.insert(name.into(), Arc::new(transform));
    }

    /// Remove a transform, returning whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let mut inner = self.inner.write().expect("geometry registry poisoned");
        inner.remove(name).is_some()
    }

    /// Whether a transform of this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("geometry registry poisoned");
        inner.contains_key(name)
    }

    /// Registered names, in order.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("geometry registry poisoned");
        inner.keys().cloned().collect()
    }

    /// Apply the named transform to a dataset.
    pub fn apply(
        &self,
        name: &str,
        dataset: BoutDataset,
        coordinates: Option<&Coordinates>,
    ) -> CollectResult<BoutDataset> {
        let transform = {
            let inner = self.inner.read().expect("geometry registry poisoned");
            inner
                .get(name)
                .cloned()
                .ok_or_else(|| CollectError::GeometryNotFound(name.to_string()))?
        };
        info!(geometry = %name, "applying geometry transform");
        transform(dataset, coordinates)
    }
}

/// The process-wide default registry.
pub fn default_registry() -> &'static GeometryRegistry {
    static REGISTRY: OnceLock<GeometryRegistry> = OnceLock::new();
    REGISTRY.get_or_init(GeometryRegistry::new)
}
