//! Community detection over the undirected projection of the symbol
//! graph: Louvain modularity optimization with a greedy-merge
//! fallback, plus directory-mismatch reporting.
//!
//! Determinism matters more than squeezing the last modularity
//! fraction: node traversal follows arena order and every tie breaks
//! toward the lower id, so repeated runs on an unchanged store yield
//! identical assignments without a random seed.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::DepGraph;

const MAX_LEVELS: usize = 10;

/// One detected community.
#[derive(Debug, Clone)]
pub struct Community {
    pub id: i64,
    /// Member node indices, ascending.
    pub members: Vec<u32>,
    /// Short label from the dominant containing directory.
    pub label: String,
}

/// Per-cluster physical-scatter report.
#[derive(Debug, Clone)]
pub struct ClusterReport {
    pub cluster_id: i64,
    pub label: String,
    pub size: usize,
    /// Distinct containing directories, sorted.
    pub directories: Vec<String>,
    /// Members outside the majority directory.
    pub mismatches: usize,
}

/// Weighted undirected adjacency in arena order.
struct Projection {
    neighbors: Vec<Vec<(u32, f64)>>,
    total_weight: f64,
}

impl Projection {
    fn from_graph(graph: &DepGraph) -> Self {
        let mut neighbors = vec![Vec::new(); graph.len()];
        let mut total_weight = 0.0;
        let mut pairs: Vec<((u32, u32), f64)> = graph.undirected_weights().into_iter().collect();
        pairs.sort_by_key(|&(key, _)| key);
        for ((a, b), weight) in pairs {
            neighbors[a as usize].push((b, weight));
            neighbors[b as usize].push((a, weight));
            total_weight += weight;
        }
        Self {
            neighbors,
            total_weight,
        }
    }

    fn degree(&self, node: usize) -> f64 {
        self.neighbors[node].iter().map(|&(_, w)| w).sum()
    }
}

/// Louvain local moving + aggregation.
///
/// Errs when the first level cannot improve on all-singletons despite
/// the graph having edges; callers run [`greedy_communities`] instead.
pub fn louvain(graph: &DepGraph) -> Result<Vec<Community>> {
    let projection = Projection::from_graph(graph);
    if projection.total_weight == 0.0 {
        // No edges: every node is its own community.
        return Ok(finalize(graph, (0..graph.len()).collect()));
    }

    // Original node -> current-level node; levels shrink as
    // communities collapse into single nodes.
    let mut node_to_level: Vec<usize> = (0..graph.len()).collect();
    let mut level_neighbors = projection.neighbors.clone();

    for level in 0..MAX_LEVELS {
        let (community, moved) = local_moving(&level_neighbors, projection.total_weight);
        if !moved {
            if level == 0 {
                bail!("no positive modularity gain at the first level");
            }
            break;
        }
        for slot in node_to_level.iter_mut() {
            *slot = community[*slot];
        }
        level_neighbors = aggregate(&level_neighbors, &community);
        if level_neighbors.len() <= 1 {
            break;
        }
    }
    Ok(finalize(graph, node_to_level))
}

/// One level of local moving. Returns the compacted community id per
/// level node and whether any node moved.
fn local_moving(neighbors: &[Vec<(u32, f64)>], total_weight: f64) -> (Vec<usize>, bool) {
    let n = neighbors.len();
    let degrees: Vec<f64> = (0..n)
        .map(|i| neighbors[i].iter().map(|&(_, w)| w).sum())
        .collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut community_total: Vec<f64> = degrees.clone();
    let two_m = 2.0 * total_weight;

    let mut any_moved = false;
    loop {
        let mut moved_this_sweep = false;
        for node in 0..n {
            let current = community[node];
            community_total[current] -= degrees[node];

            // Weight from this node into each adjacent community.
            let mut into: BTreeMap<usize, f64> = BTreeMap::new();
            into.insert(current, 0.0);
            for &(neighbor, weight) in &neighbors[node] {
                if neighbor as usize != node {
                    *into.entry(community[neighbor as usize]).or_default() += weight;
                }
            }

            let mut best = current;
            let mut best_gain = into[&current] - community_total[current] * degrees[node] / two_m;
            for (&candidate, &weight_in) in &into {
                let gain = weight_in - community_total[candidate] * degrees[node] / two_m;
                if gain > best_gain + 1e-12 {
                    best = candidate;
                    best_gain = gain;
                }
            }

            community_total[best] += degrees[node];
            if best != current {
                community[node] = best;
                moved_this_sweep = true;
                any_moved = true;
            }
        }
        if !moved_this_sweep {
            break;
        }
    }

    // Compact ids to 0..k in order of first appearance.
    let mut compact: BTreeMap<usize, usize> = BTreeMap::new();
    for &c in &community {
        let next = compact.len();
        compact.entry(c).or_insert(next);
    }
    for slot in community.iter_mut() {
        *slot = compact[slot];
    }
    (community, any_moved)
}

/// Collapse each community into one node of the next level, summing
/// edge weights. Internal weight becomes a self-loop.
fn aggregate(neighbors: &[Vec<(u32, f64)>], community: &[usize]) -> Vec<Vec<(u32, f64)>> {
    let next_n = community.iter().copied().max().map_or(0, |m| m + 1);
    let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (node, adjacency) in neighbors.iter().enumerate() {
        let a = community[node];
        for &(neighbor, weight) in adjacency {
            let b = community[neighbor as usize];
            // Each undirected edge appears twice in the adjacency;
            // keep only the canonical direction.
            if node <= neighbor as usize {
                let key = (a.min(b), a.max(b));
                *merged.entry(key).or_default() += weight;
            }
        }
    }

    let mut out = vec![Vec::new(); next_n];
    for ((a, b), weight) in merged {
        out[a].push((b as u32, weight));
        if a != b {
            out[b].push((a as u32, weight));
        }
    }
    out
}

/// Greedy modularity merging: repeatedly merge the connected pair of
/// communities with the best positive gain.
pub fn greedy_communities(graph: &DepGraph) -> Vec<Community> {
    let projection = Projection::from_graph(graph);
    let n = graph.len();
    let mut assignment: Vec<usize> = (0..n).collect();
    if projection.total_weight == 0.0 {
        return finalize(graph, assignment);
    }
    let two_m = 2.0 * projection.total_weight;
    let mut degree: Vec<f64> = (0..n).map(|i| projection.degree(i)).collect();

    loop {
        // Cross-community weights at the current assignment.
        let mut between: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for node in 0..n {
            for &(neighbor, weight) in &projection.neighbors[node] {
                let (a, b) = (assignment[node], assignment[neighbor as usize]);
                if a < b {
                    *between.entry((a, b)).or_default() += weight;
                }
            }
        }

        let mut best: Option<((usize, usize), f64)> = None;
        for (&(a, b), &weight) in &between {
            let gain = weight / projection.total_weight - degree[a] * degree[b] / (two_m * two_m) * 2.0;
            if gain > 1e-12 && best.map(|(_, g)| gain > g).unwrap_or(true) {
                best = Some(((a, b), gain));
            }
        }
        let Some(((a, b), _)) = best else { break };

        for slot in assignment.iter_mut() {
            if *slot == b {
                *slot = a;
            }
        }
        degree[a] += degree[b];
        degree[b] = 0.0;
    }
    finalize(graph, assignment)
}

/// Detect communities: Louvain first, greedy merging when Louvain
/// reports no gain structure. Returns the communities and whether the
/// fallback ran.
pub fn communities(graph: &DepGraph) -> (Vec<Community>, bool) {
    match louvain(graph) {
        Ok(found) => (found, false),
        Err(_) => (greedy_communities(graph), true),
    }
}

fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

fn short_label(dir: &str) -> String {
    if dir.is_empty() {
        return "root".to_string();
    }
    dir.rsplit('/').next().unwrap_or(dir).to_string()
}

/// Compact assignments into [`Community`] values with directory
/// labels; ids are dense, ordered by first member.
fn finalize(graph: &DepGraph, assignment: Vec<usize>) -> Vec<Community> {
    let mut members: BTreeMap<usize, Vec<u32>> = BTreeMap::new();
    let mut first_seen: Vec<usize> = Vec::new();
    for (node, &community) in assignment.iter().enumerate() {
        if !members.contains_key(&community) {
            first_seen.push(community);
        }
        members.entry(community).or_default().push(node as u32);
    }

    first_seen
        .into_iter()
        .enumerate()
        .map(|(id, community)| {
            let nodes = members.remove(&community).unwrap_or_default();
            // Dominant directory, first-seen tie-break.
            let mut counts: Vec<(String, usize)> = Vec::new();
            for &node in &nodes {
                let dir = parent_dir(&graph.node(node).file_path);
                match counts.iter_mut().find(|(d, _)| *d == dir) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((dir, 1)),
                }
            }
            let dominant = counts
                .iter()
                .max_by_key(|&&(_, count)| count)
                .map(|(dir, _)| dir.clone())
                .unwrap_or_default();
            Community {
                id: id as i64,
                members: nodes,
                label: short_label(&dominant),
            }
        })
        .collect()
}

/// Group each community's members by physical directory and report
/// scatter, sorted by mismatch count descending (ties by id).
pub fn compare_with_directories(graph: &DepGraph, communities: &[Community]) -> Vec<ClusterReport> {
    let mut reports: Vec<ClusterReport> = communities
        .iter()
        .map(|community| {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for &node in &community.members {
                *counts
                    .entry(parent_dir(&graph.node(node).file_path))
                    .or_default() += 1;
            }
            let majority = counts.values().copied().max().unwrap_or(0);
            let directories: BTreeSet<String> = counts.keys().cloned().collect();
            ClusterReport {
                cluster_id: community.id,
                label: community.label.clone(),
                size: community.members.len(),
                directories: directories.into_iter().collect(),
                mismatches: community.members.len() - majority,
            }
        })
        .collect();
    reports.sort_by_key(|r| (std::cmp::Reverse(r.mismatches), r.cluster_id));
    reports
}
