//! Merging scalar run metadata across tiles and sets.

use std::collections::BTreeMap;

use bout_file::{ScalarValue, TileMeta};
use tracing::debug;

use crate::error::{CollectError, CollectResult};

/// Scalar keys that legitimately differ between tiles of one set and are
/// dropped from the merged record instead of propagated.
pub const PER_TILE_KEYS: &[&str] = &["PE_XIND", "PE_YIND"];

/// The merged scalar metadata of a reconstructed dataset.
///
/// Attached under the `metadata` key on the dataset and on every variable,
/// so it survives variable-level selection that drops dataset attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunMetadata {
    scalars: BTreeMap<String, ScalarValue>,
}

impl RunMetadata {
    /// Merge the scalar records of one set's tiles.
    ///
    /// A scalar that differs between two tiles is a consistency violation
    /// (`MetadataError`), except for the known per-tile keys, which are
    /// silently dropped.
    pub fn merge_set(tiles: &[TileMeta]) -> CollectResult<Self> {
        let mut scalars: BTreeMap<String, ScalarValue> = BTreeMap::new();
        let mut first_seen: BTreeMap<String, &TileMeta> = BTreeMap::new();

        for tile in tiles {
            for (key, value) in &tile.scalars {
                if PER_TILE_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match scalars.get(key) {
                    None => {
                        scalars.insert(key.clone(), value.clone());
                        first_seen.insert(key.clone(), tile);
                    }
                    Some(existing) if existing == value => {}
                    Some(existing) => {
                        let origin = first_seen
                            .get(key)
                            .map(|t| t.path.display().to_string())
                            .unwrap_or_default();
                        return Err(CollectError::metadata(format!(
                            "'{key}' differs between tiles: {existing} in {origin} \
                             vs {value} in {}",
                            tile.path.display()
                        )));
                    }
                }
            }
        }
        Ok(Self { scalars })
    }

    /// Merge per-set records into one. The first (earliest) set wins;
    /// later differences are expected for restart bookkeeping scalars and
    /// only logged.
    pub fn merge_sets(records: Vec<RunMetadata>) -> Self {
        let mut iter = records.into_iter();
        let mut merged = iter.next().unwrap_or_default();
        for record in iter {
            for (key, value) in record.scalars {
                match merged.scalars.get(&key) {
                    None => {
                        merged.scalars.insert(key, value);
                    }
                    Some(existing) if *existing == value => {}
                    Some(existing) => {
                        debug!(key = %key, first = %existing, later = %value,
                               "keeping first set's value for differing scalar");
                    }
                }
            }
        }
        merged
    }

    /// Look up a scalar by key.
    pub fn get(&self, key: &str) -> Option<&ScalarValue> {
        self.scalars.get(key)
    }

    /// Look up an integer-valued scalar.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.scalars.get(key).and_then(ScalarValue::as_int)
    }

    /// Insert or replace a scalar.
    pub fn set(&mut self, key: impl Into<String>, value: ScalarValue) {
        self.scalars.insert(key.into(), value);
    }

    /// Remove a scalar, returning it.
    pub fn remove(&mut self, key: &str) -> Option<ScalarValue> {
        self.scalars.remove(key)
    }

    /// Iterate over all scalars in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScalarValue)> {
        self.scalars.iter()
    }

    /// Number of scalars.
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    /// Whether the record is empty.
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }
}
