//! Meridian: a structural codebase index with graph analytics
//!
//! Meridian watches a source tree, persists its symbols and references
//! to SQLite, and answers structural questions over the resulting
//! dependency graph: what is central (PageRank, betweenness), what
//! clusters together (Louvain communities), what cycles and layer
//! violations exist, what is dead, what carries debt, and what is
//! risky to touch.
//!
//! # Conventions
//!
//! - **Paths**: workspace-relative with forward slashes
//! - **Line positions**: 1-indexed (line 1 is the first line)
//! - **Determinism**: the same tree and history produce byte-identical
//!   stored metrics; no randomness anywhere in the pipeline
//!
//! Language parsing is not part of this crate: embedders implement
//! [`extract::Extractor`] per language and register them in an
//! [`extract::ExtractorRegistry`]. Version-control history likewise
//! arrives as parsed [`history::CommitRecord`]s.
//!
//! The sole mutator is [`index::Engine::reindex`]; every query entry
//! point refreshes a stale index automatically unless the engine was
//! opened read-only, in which case it fails fast.

pub mod analysis;
pub mod change;
pub mod complexity;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod history;
pub mod index;
pub mod store;

pub use config::EngineConfig;
pub use error::EngineError;
pub use extract::{Extraction, Extractor, ExtractorRegistry};
pub use index::{Engine, IndexSummary};
pub use store::SymbolStore;
