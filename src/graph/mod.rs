//! In-memory dependency graphs rebuilt from the store for each
//! analytics pass.
//!
//! Nodes live in a dense arena indexed by `u32`, adjacency as index
//! lists with typed edges. The graphs are immutable snapshots: build
//! once, run every algorithm against the same shape, write results
//! back. Nothing here touches the store after construction.

mod centrality;
mod community;
mod pagerank;
mod paths;
mod scc;

use anyhow::Result;
use std::collections::HashMap;

use crate::extract::{EdgeKind, SymbolKind};
use crate::store::SymbolStore;

pub use centrality::{betweenness, degrees, BetweennessResult};
pub use community::{
    communities, compare_with_directories, greedy_communities, louvain, ClusterReport, Community,
};
pub use pagerank::{adaptive_alpha, degree_fallback, pagerank, PagerankResult};
pub use paths::{resolve_symbol, shortest_path, PathHop, Resolution};
pub use scc::{cycle_ratio, cycles, layers, strongly_connected_components, Cycle, LayerReport};

/// One symbol projected into the arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub symbol_id: i64,
    pub name: String,
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub file_id: i64,
    pub file_path: String,
    pub exported: bool,
}

/// Dense directed multigraph over symbols.
pub struct DepGraph {
    pub nodes: Vec<NodeData>,
    /// Forward adjacency: outgoing (target, kind) per node.
    pub out: Vec<Vec<(u32, EdgeKind)>>,
    /// Reverse adjacency: incoming sources per node.
    pub incoming: Vec<Vec<u32>>,
    by_symbol_id: HashMap<i64, u32>,
}

impl DepGraph {
    /// Load every symbol and edge from the store. Edges with a missing
    /// endpoint are skipped.
    pub fn from_store(store: &SymbolStore) -> Result<Self> {
        let symbols = store.all_symbols()?;
        let mut nodes = Vec::with_capacity(symbols.len());
        let mut by_symbol_id = HashMap::with_capacity(symbols.len());
        for row in symbols {
            by_symbol_id.insert(row.id, nodes.len() as u32);
            nodes.push(NodeData {
                symbol_id: row.id,
                name: row.name,
                qualified_name: row.qualified_name,
                kind: row.kind,
                file_id: row.file_id,
                file_path: row.file_path,
                exported: row.is_exported,
            });
        }

        let mut out = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for edge in store.all_edges()? {
            let (Some(&src), Some(&tgt)) = (
                by_symbol_id.get(&edge.source_id),
                by_symbol_id.get(&edge.target_id),
            ) else {
                continue;
            };
            out[src as usize].push((tgt, edge.kind));
            incoming[tgt as usize].push(src);
        }

        Ok(Self {
            nodes,
            out,
            incoming,
            by_symbol_id,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, symbol_id: i64) -> Option<u32> {
        self.by_symbol_id.get(&symbol_id).copied()
    }

    pub fn node(&self, index: u32) -> &NodeData {
        &self.nodes[index as usize]
    }

    /// Distinct out-neighbors of a node, duplicates collapsed.
    pub fn successors(&self, index: u32) -> Vec<u32> {
        let mut targets: Vec<u32> = self.out[index as usize].iter().map(|&(t, _)| t).collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Distinct in-neighbors of a node.
    pub fn predecessors(&self, index: u32) -> Vec<u32> {
        let mut sources = self.incoming[index as usize].clone();
        sources.sort_unstable();
        sources.dedup();
        sources
    }

    /// Undirected weighted projection: unordered pair -> multi-edge
    /// count, pairs ordered (low, high) with self-loops dropped.
    pub fn undirected_weights(&self) -> HashMap<(u32, u32), f64> {
        let mut weights: HashMap<(u32, u32), f64> = HashMap::new();
        for (src, targets) in self.out.iter().enumerate() {
            let src = src as u32;
            for &(tgt, _) in targets {
                if src == tgt {
                    continue;
                }
                let key = (src.min(tgt), src.max(tgt));
                *weights.entry(key).or_default() += 1.0;
            }
        }
        weights
    }
}

/// File-granularity graph from the aggregated `file_edges` table.
pub struct FileGraph {
    /// (file_id, path) per node, arena order.
    pub files: Vec<(i64, String)>,
    /// Outgoing (target, symbol_count) per node.
    pub out: Vec<Vec<(u32, i64)>>,
    pub incoming: Vec<Vec<u32>>,
    pub(crate) by_file_id: HashMap<i64, u32>,
}

impl FileGraph {
    pub fn from_store(store: &SymbolStore) -> Result<Self> {
        let rows = store.all_files()?;
        let mut files = Vec::with_capacity(rows.len());
        let mut by_file_id = HashMap::with_capacity(rows.len());
        for row in rows {
            by_file_id.insert(row.id, files.len() as u32);
            files.push((row.id, row.path));
        }

        let mut out = vec![Vec::new(); files.len()];
        let mut incoming = vec![Vec::new(); files.len()];
        let conn = store.connection();
        let mut stmt = conn.prepare(
            "SELECT source_file_id, target_file_id, symbol_count FROM file_edges ORDER BY id",
        )?;
        let edges = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for edge in edges {
            let (source, target, count) = edge?;
            let (Some(&src), Some(&tgt)) = (by_file_id.get(&source), by_file_id.get(&target))
            else {
                continue;
            };
            out[src as usize].push((tgt, count));
            incoming[tgt as usize].push(src);
        }

        Ok(Self {
            files,
            out,
            incoming,
            by_file_id,
        })
    }

    pub fn index_of(&self, file_id: i64) -> Option<u32> {
        self.by_file_id.get(&file_id).copied()
    }

    /// Files importing the given file.
    pub fn importers(&self, index: u32) -> &[u32] {
        &self.incoming[index as usize]
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::graph;

    #[test]
    fn test_successors_dedup_multi_edges() {
        let mut g = graph(&[("a", "a.py"), ("b", "b.py")], &[(0, 1), (0, 1)]);
        g.out[0].push((1, crate::extract::EdgeKind::Imports));
        assert_eq!(g.successors(0), vec![1]);
        assert_eq!(g.predecessors(1), vec![0]);
    }

    #[test]
    fn test_undirected_weights_collapse_directions() {
        let g = graph(&[("a", "a.py"), ("b", "b.py")], &[(0, 1), (1, 0), (0, 1)]);
        let weights = g.undirected_weights();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[&(0, 1)], 3.0);
    }
}
