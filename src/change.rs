//! Change detection: decide which files need re-extraction without
//! reading every file's content.
//!
//! The walk respects `.gitignore` and skips hidden entries and the
//! index directory itself. A file whose recorded mtime matches within
//! a small tolerance is assumed unchanged; anything else gets its
//! content hashed (in parallel) and the hash settles it.

use anyhow::{Context, Result};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::config::{EngineConfig, DEFAULT_INDEX_DIR};

/// Filesystem clocks and stored REAL columns lose precision; treat
/// sub-millisecond mtime drift as equality.
const MTIME_TOLERANCE: f64 = 1e-3;

/// Outcome of scanning the tree against the store's fingerprints.
///
/// Paths are workspace-relative with forward slashes, each list sorted.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Paths that need (re-)extraction: added then modified, sorted.
    pub fn dirty(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.added.len() + self.modified.len());
        out.extend(self.added.iter().cloned());
        out.extend(self.modified.iter().cloned());
        out.sort_unstable();
        out
    }
}

/// Snapshot of one on-disk file from the walk.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub mtime: f64,
}

impl FileSnapshot {
    /// Hash the file content. The file may vanish between the walk and
    /// this read; callers map that error to a removal.
    pub fn hash(&self) -> Result<String> {
        hash_file(&self.abs_path)
    }
}

/// Hex-encoded sha256 of a file's bytes.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Count lines the way `wc -l` does not: a trailing fragment without a
/// newline still counts as a line.
pub fn count_lines(content: &[u8]) -> u32 {
    if content.is_empty() {
        return 0;
    }
    let mut lines = content.iter().filter(|&&b| b == b'\n').count() as u32;
    if content.last() != Some(&b'\n') {
        lines += 1;
    }
    lines
}

fn mtime_seconds(meta: &std::fs::Metadata) -> f64 {
    meta.modified()
        .ok()
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Walk the workspace and return snapshots of files the registry
/// claims, sorted by relative path.
pub fn walk_supported(
    config: &EngineConfig,
    supports: impl Fn(&Path) -> bool,
) -> Result<Vec<FileSnapshot>> {
    let root = &config.root;
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .filter_entry(|entry| entry.file_name() != DEFAULT_INDEX_DIR)
        .build();

    let mut snapshots = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let abs = entry.path();
        if !supports(abs) {
            continue;
        }
        let Ok(rel) = abs.strip_prefix(root) else {
            continue;
        };
        let meta = entry
            .metadata()
            .with_context(|| format!("stat {}", abs.display()))?;
        snapshots.push(FileSnapshot {
            rel_path: rel.to_string_lossy().replace('\\', "/"),
            abs_path: abs.to_path_buf(),
            mtime: mtime_seconds(&meta),
        });
    }
    snapshots.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(snapshots)
}

/// Classify on-disk snapshots against recorded (mtime, hash)
/// fingerprints.
///
/// Files passing the mtime fast path are unchanged without a read.
/// The rest are hashed in parallel; a matching hash is still
/// unchanged (touch without edit), a vanished file counts as removed.
pub fn detect_changes(
    snapshots: &[FileSnapshot],
    recorded: &HashMap<String, (Option<f64>, Option<String>)>,
) -> ChangeSet {
    let mut set = ChangeSet::default();
    let mut suspects: Vec<&FileSnapshot> = Vec::new();

    for snap in snapshots {
        match recorded.get(&snap.rel_path) {
            None => set.added.push(snap.rel_path.clone()),
            Some((Some(mtime), Some(_))) if (snap.mtime - mtime).abs() <= MTIME_TOLERANCE => {
                set.unchanged.push(snap.rel_path.clone());
            }
            Some(_) => suspects.push(snap),
        }
    }

    let confirmed: Vec<(String, Option<String>)> = suspects
        .par_iter()
        .map(|snap| (snap.rel_path.clone(), snap.hash().ok()))
        .collect();

    for (rel_path, hash) in confirmed {
        match hash {
            None => set.removed.push(rel_path),
            Some(hash) => {
                let stored = recorded.get(&rel_path).and_then(|(_, h)| h.as_deref());
                if stored == Some(hash.as_str()) {
                    set.unchanged.push(rel_path);
                } else {
                    set.modified.push(rel_path);
                }
            }
        }
    }

    let seen: std::collections::HashSet<&str> =
        snapshots.iter().map(|s| s.rel_path.as_str()).collect();
    for path in recorded.keys() {
        if !seen.contains(path.as_str()) {
            set.removed.push(path.clone());
        }
    }

    set.added.sort_unstable();
    set.modified.sort_unstable();
    set.removed.sort_unstable();
    set.unchanged.sort_unstable();
    set
}
