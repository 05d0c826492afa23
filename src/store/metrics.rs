//! Graph metrics, clusters, history aggregates: full-replace writes

use anyhow::Result;
use rusqlite::params;
use std::collections::HashMap;

use super::SymbolStore;

/// Per-symbol graph metric row, written back after an analytics pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsRow {
    pub symbol_id: i64,
    pub pagerank: f64,
    pub in_degree: i64,
    pub out_degree: i64,
    pub betweenness: f64,
}

/// Per-symbol community assignment.
#[derive(Debug, Clone)]
pub struct ClusterRow {
    pub symbol_id: i64,
    pub cluster_id: i64,
    pub cluster_label: Option<String>,
}

/// Per-file history aggregate plus the structural complexity signal.
#[derive(Debug, Clone, Default)]
pub struct FileStatsRow {
    pub file_id: i64,
    pub commit_count: i64,
    pub total_churn: i64,
    pub distinct_authors: i64,
    pub complexity: f64,
}

impl SymbolStore {
    /// Replace all graph metric rows. Derived data is never patched
    /// incrementally; each analytics pass rewrites the full table.
    pub fn replace_graph_metrics(&self, rows: &[MetricsRow]) -> Result<()> {
        self.conn.execute("DELETE FROM graph_metrics", [])?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO graph_metrics (symbol_id, pagerank, in_degree, out_degree, betweenness)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.symbol_id,
                row.pagerank,
                row.in_degree,
                row.out_degree,
                row.betweenness,
            ])?;
        }
        Ok(())
    }

    /// Replace all cluster assignments.
    pub fn replace_clusters(&self, rows: &[ClusterRow]) -> Result<()> {
        self.conn.execute("DELETE FROM clusters", [])?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO clusters (symbol_id, cluster_id, cluster_label) VALUES (?1, ?2, ?3)",
        )?;
        for row in rows {
            stmt.execute(params![row.symbol_id, row.cluster_id, row.cluster_label])?;
        }
        Ok(())
    }

    /// All metric rows keyed by symbol id.
    pub fn graph_metrics(&self) -> Result<HashMap<i64, MetricsRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol_id, pagerank, in_degree, out_degree, betweenness
             FROM graph_metrics",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MetricsRow {
                symbol_id: row.get(0)?,
                pagerank: row.get(1)?,
                in_degree: row.get(2)?,
                out_degree: row.get(3)?,
                betweenness: row.get(4)?,
            })
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let row = row?;
            out.insert(row.symbol_id, row);
        }
        Ok(out)
    }

    /// Top symbols by stored PageRank, ties broken by symbol id.
    pub fn top_by_pagerank(&self, limit: usize) -> Result<Vec<MetricsRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol_id, pagerank, in_degree, out_degree, betweenness
             FROM graph_metrics ORDER BY pagerank DESC, symbol_id LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(MetricsRow {
                symbol_id: row.get(0)?,
                pagerank: row.get(1)?,
                in_degree: row.get(2)?,
                out_degree: row.get(3)?,
                betweenness: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All cluster assignments keyed by symbol id.
    pub fn cluster_assignments(&self) -> Result<HashMap<i64, ClusterRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT symbol_id, cluster_id, cluster_label FROM clusters")?;
        let rows = stmt.query_map([], |row| {
            Ok(ClusterRow {
                symbol_id: row.get(0)?,
                cluster_id: row.get(1)?,
                cluster_label: row.get(2)?,
            })
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let row = row?;
            out.insert(row.symbol_id, row);
        }
        Ok(out)
    }

    /// Upsert one file's history aggregate. The complexity column is
    /// preserved when `complexity` is None.
    pub fn upsert_file_stats(&self, row: &FileStatsRow, complexity: Option<f64>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO file_stats (file_id, commit_count, total_churn, distinct_authors, complexity)
             VALUES (?1, ?2, ?3, ?4, COALESCE(?5, 0))
             ON CONFLICT(file_id) DO UPDATE SET
                 commit_count = excluded.commit_count,
                 total_churn = excluded.total_churn,
                 distinct_authors = excluded.distinct_authors,
                 complexity = COALESCE(?5, file_stats.complexity)",
            params![
                row.file_id,
                row.commit_count,
                row.total_churn,
                row.distinct_authors,
                complexity,
            ],
        )?;
        Ok(())
    }

    /// Write just the complexity signal for a file, creating the stats
    /// row when history ingestion has not run.
    pub fn set_file_complexity(&self, file_id: i64, complexity: f64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO file_stats (file_id, complexity) VALUES (?1, ?2)
             ON CONFLICT(file_id) DO UPDATE SET complexity = excluded.complexity",
            params![file_id, complexity],
        )?;
        Ok(())
    }

    /// All file stats keyed by file id.
    pub fn all_file_stats(&self) -> Result<HashMap<i64, FileStatsRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_id, commit_count, total_churn, distinct_authors, complexity
             FROM file_stats",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FileStatsRow {
                file_id: row.get(0)?,
                commit_count: row.get(1)?,
                total_churn: row.get(2)?,
                distinct_authors: row.get(3)?,
                complexity: row.get(4)?,
            })
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let row = row?;
            out.insert(row.file_id, row);
        }
        Ok(out)
    }

    /// Files with the highest total churn, paths included.
    pub fn top_churn_files(&self, limit: usize) -> Result<Vec<(String, FileStatsRow)>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.path, s.file_id, s.commit_count, s.total_churn, s.distinct_authors, s.complexity
             FROM file_stats s JOIN files f ON s.file_id = f.id
             ORDER BY s.total_churn DESC, f.path LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                FileStatsRow {
                    file_id: row.get(1)?,
                    commit_count: row.get(2)?,
                    total_churn: row.get(3)?,
                    distinct_authors: row.get(4)?,
                    complexity: row.get(5)?,
                },
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Co-change partners of a file with counts, strongest first.
    pub fn cochange_for_file(&self, file_id: i64) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT CASE WHEN file_id_a = ?1 THEN file_id_b ELSE file_id_a END, cochange_count
             FROM cochange WHERE file_id_a = ?1 OR file_id_b = ?1
             ORDER BY cochange_count DESC, 1",
        )?;
        let rows = stmt.query_map(params![file_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{SymbolKind, SymbolRecord};

    fn seeded_store() -> (tempfile::TempDir, SymbolStore, Vec<i64>) {
        let temp = tempfile::TempDir::new().unwrap();
        let store = SymbolStore::open(temp.path().join("index.db")).unwrap();
        let fid = store.upsert_file("a.py", None, "h", 1.0, 10).unwrap();
        let names = store
            .replace_file_symbols(
                fid,
                &[
                    SymbolRecord::new("a", SymbolKind::Function, 1, 2),
                    SymbolRecord::new("b", SymbolKind::Function, 3, 4),
                ],
            )
            .unwrap();
        let mut ids: Vec<i64> = names.values().copied().collect();
        ids.sort_unstable();
        (temp, store, ids)
    }

    #[test]
    fn test_replace_graph_metrics_is_full_rewrite() {
        let (_temp, store, ids) = seeded_store();
        store
            .replace_graph_metrics(&[
                MetricsRow {
                    symbol_id: ids[0],
                    pagerank: 0.7,
                    ..Default::default()
                },
                MetricsRow {
                    symbol_id: ids[1],
                    pagerank: 0.3,
                    ..Default::default()
                },
            ])
            .unwrap();
        store
            .replace_graph_metrics(&[MetricsRow {
                symbol_id: ids[1],
                pagerank: 0.9,
                in_degree: 2,
                out_degree: 0,
                betweenness: 1.5,
            }])
            .unwrap();

        let metrics = store.graph_metrics().unwrap();
        assert_eq!(metrics.len(), 1, "previous rows are gone");
        assert_eq!(metrics[&ids[1]].pagerank, 0.9);

        let top = store.top_by_pagerank(5).unwrap();
        assert_eq!(top[0].symbol_id, ids[1]);
    }

    #[test]
    fn test_file_stats_complexity_survives_history_refresh() {
        let (_temp, store, _ids) = seeded_store();
        store.set_file_complexity(1, 4.5).unwrap();
        store
            .upsert_file_stats(
                &FileStatsRow {
                    file_id: 1,
                    commit_count: 12,
                    total_churn: 300,
                    distinct_authors: 3,
                    complexity: 0.0,
                },
                None,
            )
            .unwrap();
        let stats = store.all_file_stats().unwrap();
        assert_eq!(stats[&1].commit_count, 12);
        assert!((stats[&1].complexity - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_top_churn_orders_by_total_churn() {
        let (_temp, store, _ids) = seeded_store();
        let fb = store.upsert_file("b.py", None, "h", 1.0, 5).unwrap();
        // Same commit count; churn must decide the order.
        store
            .upsert_file_stats(
                &FileStatsRow {
                    file_id: 1,
                    commit_count: 3,
                    total_churn: 3,
                    distinct_authors: 1,
                    complexity: 0.0,
                },
                None,
            )
            .unwrap();
        store
            .upsert_file_stats(
                &FileStatsRow {
                    file_id: fb,
                    commit_count: 3,
                    total_churn: 36,
                    distinct_authors: 1,
                    complexity: 0.0,
                },
                None,
            )
            .unwrap();
        let top = store.top_churn_files(2).unwrap();
        assert_eq!(top[0].0, "b.py");
        assert_eq!(top[0].1.total_churn, 36);
        assert_eq!(top[1].0, "a.py");
    }

    #[test]
    fn test_cochange_lookup_is_symmetric() {
        let (_temp, store, _ids) = seeded_store();
        let fb = store.upsert_file("b.py", None, "h", 1.0, 5).unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO cochange (file_id_a, file_id_b, cochange_count) VALUES (1, ?1, 7)",
                [fb],
            )
            .unwrap();
        assert_eq!(store.cochange_for_file(1).unwrap(), vec![(fb, 7)]);
        assert_eq!(store.cochange_for_file(fb).unwrap(), vec![(1, 7)]);
    }
}
