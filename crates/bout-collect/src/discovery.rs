//! Dump-file discovery and grouping into sets.
//!
//! A datapath can name a single file, a directory, or a glob pattern
//! (possibly spanning several run directories, as restarted runs do).
//! Matched files are ordered and grouped into [`DumpSet`]s: a new set
//! starts whenever the root tile (`<prefix>.0.nc`) reappears, which is how
//! an append/restart episode announces itself.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CollectError, CollectResult};

/// One matched dump file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub path: PathBuf,
    /// Filename index (`<prefix>.<index>.nc`).
    pub index: usize,
}

/// A maximal group of tiles sharing one topology and one time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpSet {
    pub files: Vec<DumpFile>,
}

impl DumpSet {
    /// Number of tiles in this set.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Parse `<prefix>.<index>.nc` (or `<prefix>.nc`, index 0).
fn parse_dump_name(name: &str, prefix: &str) -> Option<usize> {
    let rest = name.strip_prefix(prefix)?;
    let rest = rest.strip_suffix(".nc")?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.strip_prefix('.')?.parse().ok()
}

fn has_glob_meta(datapath: &str) -> bool {
    datapath.contains(['*', '?', '['])
}

/// Enumerate dump files matching `datapath` and group them into sets.
///
/// `prefix_explicit` marks a caller-supplied prefix: with it, foreign files
/// matched by the pattern are skipped; without it they are an error, since
/// silently ignoring them would hide a mistyped pattern.
pub fn discover(
    datapath: &str,
    prefix: &str,
    prefix_explicit: bool,
) -> CollectResult<Vec<DumpSet>> {
    let path = Path::new(datapath);
    let mut files: Vec<DumpFile> = Vec::new();

    if path.is_dir() {
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| CollectError::input(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(index) = parse_dump_name(&name, prefix) {
                files.push(DumpFile {
                    path: entry.path().to_path_buf(),
                    index,
                });
            }
        }
    } else if has_glob_meta(datapath) {
        let matches =
            glob::glob(datapath).map_err(|e| CollectError::input(format!("bad pattern: {e}")))?;
        for entry in matches {
            let path = entry.map_err(|e| CollectError::input(e.to_string()))?;
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            match parse_dump_name(&name, prefix) {
                Some(index) => files.push(DumpFile { path, index }),
                None if prefix_explicit => {
                    debug!(path = %path.display(), "skipping non-dump file");
                }
                None => {
                    return Err(CollectError::input(format!(
                        "'{}' matches the pattern but is not a '{prefix}' dump file; \
                         set an explicit prefix to disambiguate",
                        path.display()
                    )));
                }
            }
        }
    } else {
        if !path.is_file() {
            return Err(CollectError::input(format!(
                "no such file or directory: {datapath}"
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let index = parse_dump_name(&name, prefix).unwrap_or(0);
        files.push(DumpFile {
            path: path.to_path_buf(),
            index,
        });
    }

    if files.is_empty() {
        return Err(CollectError::input(format!(
            "no dump files matching '{datapath}' (prefix '{prefix}')"
        )));
    }

    // Deterministic order: by containing directory, then by tile index.
    files.sort_by(|a, b| {
        let da = a.path.parent().map(Path::to_path_buf).unwrap_or_default();
        let db = b.path.parent().map(Path::to_path_buf).unwrap_or_default();
        da.cmp(&db).then(a.index.cmp(&b.index))
    });

    // A reappearing root tile starts a new set.
    let mut sets: Vec<DumpSet> = Vec::new();
    for file in files {
        let start_new = match sets.last() {
            None => true,
            Some(_) => file.index == 0,
        };
        if start_new {
            sets.push(DumpSet { files: Vec::new() });
        }
        sets.last_mut().expect("set just pushed").files.push(file);
    }

    for set in &sets {
        for (expected, file) in set.files.iter().enumerate() {
            if file.index != expected {
                return Err(CollectError::input(format!(
                    "dump set is missing tile index {expected} (found {} in {})",
                    file.index,
                    file.path.display()
                )));
            }
        }
    }

    debug!(
        sets = sets.len(),
        tiles = sets.iter().map(DumpSet::len).sum::<usize>(),
        "discovered dump files"
    );
    Ok(sets)
}
