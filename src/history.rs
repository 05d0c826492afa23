//! Version-control history ingestion and derived activity signals.
//!
//! The engine does not shell out to `git`; embedders feed parsed
//! [`CommitRecord`]s (most recent first) and this module persists them
//! and rebuilds the per-file aggregates and the co-change matrix.

use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::store::{FileStatsRow, SymbolStore};

/// Commits touching more files than this are bulk operations (renames,
/// formatting sweeps) and would drown the co-change signal.
const COCHANGE_MAX_FILES: usize = 100;

/// One file touched by a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Workspace-relative path with forward slashes.
    pub path: String,
    pub lines_added: i64,
    pub lines_removed: i64,
}

/// One parsed commit, supplied by the embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub author: Option<String>,
    /// Unix seconds.
    pub timestamp: i64,
    pub message: Option<String>,
    pub changes: Vec<FileChange>,
}

/// Counts reported after a history ingestion pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct HistorySummary {
    pub commits: usize,
    pub file_changes: usize,
    pub cochange_pairs: usize,
}

/// Replace stored history with the given commits and rebuild all
/// derived aggregates.
///
/// At most `max_commits` records are kept (the slice is assumed most
/// recent first). Paths not present in the `files` table still get a
/// `file_changes` row (with NULL file id) so churn for deleted files
/// remains visible, but they never contribute to stats or co-change.
pub fn ingest_history(
    store: &SymbolStore,
    commits: &[CommitRecord],
    max_commits: usize,
) -> Result<HistorySummary> {
    let conn = store.connection();
    conn.execute("DELETE FROM commits", [])?;
    conn.execute("DELETE FROM cochange", [])?;

    let mut path_ids: HashMap<String, i64> = HashMap::new();
    for file in store.all_files()? {
        path_ids.insert(file.path, file.id);
    }

    let kept = &commits[..commits.len().min(max_commits)];
    let mut summary = HistorySummary {
        commits: kept.len(),
        ..Default::default()
    };

    // (commit_count, total_churn, authors) per known file id.
    let mut stats: BTreeMap<i64, (i64, i64, HashSet<String>)> = BTreeMap::new();
    // Unordered pair (a < b) -> shared commit count.
    let mut pairs: BTreeMap<(i64, i64), i64> = BTreeMap::new();

    {
        let mut commit_stmt = conn.prepare_cached(
            "INSERT INTO commits (hash, author, timestamp, message) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut change_stmt = conn.prepare_cached(
            "INSERT INTO file_changes (commit_id, file_id, path, lines_added, lines_removed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for commit in kept {
            commit_stmt.execute(params![
                commit.hash,
                commit.author,
                commit.timestamp,
                commit.message,
            ])?;
            let commit_id = conn.last_insert_rowid();

            let mut touched: Vec<i64> = Vec::new();
            for change in &commit.changes {
                let file_id = path_ids.get(&change.path).copied();
                change_stmt.execute(params![
                    commit_id,
                    file_id,
                    change.path,
                    change.lines_added,
                    change.lines_removed,
                ])?;
                summary.file_changes += 1;

                if let Some(file_id) = file_id {
                    let entry = stats.entry(file_id).or_default();
                    entry.0 += 1;
                    entry.1 += change.lines_added + change.lines_removed;
                    if let Some(author) = &commit.author {
                        entry.2.insert(author.clone());
                    }
                    touched.push(file_id);
                }
            }

            touched.sort_unstable();
            touched.dedup();
            if touched.len() < 2 || touched.len() > COCHANGE_MAX_FILES {
                continue;
            }
            for i in 0..touched.len() {
                for j in (i + 1)..touched.len() {
                    *pairs.entry((touched[i], touched[j])).or_default() += 1;
                }
            }
        }
    }

    // Zero out aggregates for files the new history no longer touches;
    // the complexity column is structural and survives.
    conn.execute(
        "UPDATE file_stats SET commit_count = 0, total_churn = 0, distinct_authors = 0",
        [],
    )?;
    for (file_id, (commit_count, total_churn, authors)) in &stats {
        store.upsert_file_stats(
            &FileStatsRow {
                file_id: *file_id,
                commit_count: *commit_count,
                total_churn: *total_churn,
                distinct_authors: authors.len() as i64,
                complexity: 0.0,
            },
            None,
        )?;
    }

    let mut pair_stmt = conn.prepare_cached(
        "INSERT INTO cochange (file_id_a, file_id_b, cochange_count) VALUES (?1, ?2, ?3)",
    )?;
    for ((a, b), count) in &pairs {
        pair_stmt.execute(params![a, b, count])?;
        summary.cochange_pairs += 1;
    }

    Ok(summary)
}
