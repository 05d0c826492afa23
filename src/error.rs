//! Engine error taxonomy
//!
//! Fallible operations return `anyhow::Result`; errors that callers need
//! to branch on are raised as [`EngineError`] so they can be recovered
//! with `err.downcast_ref::<EngineError>()`.
//!
//! Categories:
//! - `MissingIndex`: no store exists yet — callers should trigger a full build
//! - `StaleIndex`: store exists but disagrees with disk — triggers an update
//! - `StoreLocked`: a concurrent writer holds the store — retryable
//! - `AmbiguousSymbol`: a name resolved to multiple symbols
//! - `Extraction`: a file's extractor could not produce records
//! - `Cancelled`: cooperative cancellation was requested

use thiserror::Error;

/// Stable, matchable error categories for the indexing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No index database exists at the expected location.
    #[error("no index found at {path}; run a full build first")]
    MissingIndex { path: String },

    /// The index exists but file fingerprints disagree with disk.
    #[error("index is stale: {changed} file(s) differ from the recorded state")]
    StaleIndex { changed: usize },

    /// The store is held by a concurrent writer. Retryable.
    #[error("store is locked by a concurrent writer")]
    StoreLocked,

    /// A symbol name matched more than one symbol. Candidates carry
    /// (name, file path) pairs, capped so a wildcard-like query cannot
    /// flood the message.
    #[error("symbol '{name}' is ambiguous ({n} candidates)", n = .candidates.len())]
    AmbiguousSymbol {
        name: String,
        candidates: Vec<(String, String)>,
    },

    /// An extractor failed on a single file. The indexer counts these
    /// and continues; it never aborts the whole run for one file.
    #[error("extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    /// Cooperative cancellation was requested mid-pass.
    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::StoreLocked)
    }
}

/// Map a rusqlite error to `StoreLocked` when it is a busy/locked
/// condition, otherwise pass it through as a generic store failure.
pub fn classify_sqlite_error(err: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        use rusqlite::ErrorCode;
        if matches!(
            code.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ) {
            return anyhow::Error::new(EngineError::StoreLocked);
        }
    }
    anyhow::Error::new(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_locked_is_retryable() {
        assert!(EngineError::StoreLocked.is_retryable());
        assert!(!EngineError::MissingIndex {
            path: "x".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_classify_busy_as_locked() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err = classify_sqlite_error(busy);
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::StoreLocked)
        ));
    }
}
