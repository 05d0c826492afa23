//! Store location and engine configuration
//!
//! The index lives in a project-local hidden directory by default
//! (`<root>/.meridian/index.db`) and can be relocated explicitly for
//! storage backends that cannot open WAL connections over network
//! mounts.

use std::path::{Path, PathBuf};

/// Default hidden directory under the project root.
pub const DEFAULT_INDEX_DIR: &str = ".meridian";

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "index.db";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Project root being indexed.
    pub root: PathBuf,
    /// Explicit database path; when `None`, the project-local default
    /// `<root>/.meridian/index.db` is used.
    pub db_path: Option<PathBuf>,
    /// Maximum commit records ingested per history pass.
    pub max_commits: usize,
    /// Per-file byte cap for the complexity sampler.
    pub complexity_byte_cap: u64,
}

impl EngineConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            db_path: None,
            max_commits: 5000,
            complexity_byte_cap: 1024 * 1024,
        }
    }

    /// Relocate the database to an explicit path.
    pub fn with_db_path<P: AsRef<Path>>(mut self, db_path: P) -> Self {
        self.db_path = Some(db_path.as_ref().to_path_buf());
        self
    }

    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(p) => p.clone(),
            None => self.root.join(DEFAULT_INDEX_DIR).join(DEFAULT_DB_NAME),
        }
    }

    /// Whether an index database exists (non-empty file).
    pub fn index_exists(&self) -> bool {
        let path = self.db_path();
        match std::fs::metadata(&path) {
            Ok(meta) => meta.len() > 0,
            Err(_) => false,
        }
    }
}

/// Find the project root by walking up from `start` looking for a
/// `.git` directory. Falls back to `start` itself when none is found.
pub fn find_project_root<P: AsRef<Path>>(start: P) -> PathBuf {
    let start = start
        .as_ref()
        .canonicalize()
        .unwrap_or_else(|_| start.as_ref().to_path_buf());
    let mut current = start.clone();
    loop {
        if current.join(".git").exists() {
            return current;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_path_under_hidden_dir() {
        let cfg = EngineConfig::new("/tmp/proj");
        assert_eq!(
            cfg.db_path(),
            PathBuf::from("/tmp/proj/.meridian/index.db")
        );
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let cfg = EngineConfig::new("/tmp/proj").with_db_path("/elsewhere/idx.db");
        assert_eq!(cfg.db_path(), PathBuf::from("/elsewhere/idx.db"));
    }

    #[test]
    fn test_find_project_root_locates_git_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();

        let root = find_project_root(&nested);
        assert_eq!(root, temp.path().canonicalize().unwrap());
    }
}
