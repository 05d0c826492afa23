//! PageRank with a cycle-adaptive damping factor.

use anyhow::{bail, Result};

use super::DepGraph;

const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-6;

/// Scores per node (arena order) plus the damping factor used.
#[derive(Debug, Clone)]
pub struct PagerankResult {
    pub scores: Vec<f64>,
    pub alpha: f64,
}

/// Damping factor for a graph where `cycle_ratio` of the nodes sit in
/// non-trivial strongly-connected components. Mostly-acyclic graphs
/// concentrate importance along chains and tolerate a high factor;
/// cyclic graphs need a lower one for stability. Rounded to 3 decimals
/// so stored metrics stay byte-stable across runs.
pub fn adaptive_alpha(cycle_ratio: f64) -> f64 {
    let alpha = 0.92 - 0.10 * cycle_ratio.clamp(0.0, 1.0);
    (alpha * 1000.0).round() / 1000.0
}

/// Power iteration over the out-edge structure. Multi-edges between a
/// pair count once. Dangling mass is redistributed uniformly. Returns
/// Err when the iteration does not converge within the round budget;
/// callers fall back to [`degree_fallback`].
pub fn pagerank(graph: &DepGraph, alpha: f64) -> Result<PagerankResult> {
    let n = graph.len();
    if n == 0 {
        return Ok(PagerankResult {
            scores: Vec::new(),
            alpha,
        });
    }

    let successors: Vec<Vec<u32>> = (0..n as u32).map(|i| graph.successors(i)).collect();
    let uniform = 1.0 / n as f64;
    let mut scores = vec![uniform; n];

    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![(1.0 - alpha) * uniform; n];
        let mut dangling_mass = 0.0;
        for (node, targets) in successors.iter().enumerate() {
            if targets.is_empty() {
                dangling_mass += scores[node];
                continue;
            }
            let share = alpha * scores[node] / targets.len() as f64;
            for &target in targets {
                next[target as usize] += share;
            }
        }
        let dangling_share = alpha * dangling_mass * uniform;
        for value in &mut next {
            *value += dangling_share;
        }

        let delta: f64 = scores
            .iter()
            .zip(&next)
            .map(|(old, new)| (old - new).abs())
            .sum();
        scores = next;
        if delta < TOLERANCE {
            return Ok(PagerankResult { scores, alpha });
        }
    }
    bail!("pagerank did not converge within {MAX_ITERATIONS} iterations")
}

/// Degraded-but-valid substitute: total degree normalized to sum 1.
pub fn degree_fallback(graph: &DepGraph) -> PagerankResult {
    let n = graph.len();
    let mut scores: Vec<f64> = (0..n as u32)
        .map(|i| (graph.successors(i).len() + graph.predecessors(i).len()) as f64)
        .collect();
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for score in &mut scores {
            *score /= total;
        }
    } else if n > 0 {
        scores = vec![1.0 / n as f64; n];
    }
    PagerankResult { scores, alpha: 0.0 }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::graph;
    use super::*;

    #[test]
    fn test_adaptive_alpha_bounds() {
        assert_eq!(adaptive_alpha(0.0), 0.92);
        assert_eq!(adaptive_alpha(1.0), 0.82);
        assert_eq!(adaptive_alpha(0.333), 0.887);
    }

    #[test]
    fn test_scores_sum_to_one() {
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("c", "c.py")],
            &[(0, 1), (1, 2), (0, 2)],
        );
        let result = pagerank(&g, 0.85).unwrap();
        let sum: f64 = result.scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_referenced_node_outranks_leaf() {
        // Two callers point at hub; loner points nowhere.
        let g = graph(
            &[("x", "x.py"), ("y", "y.py"), ("hub", "h.py"), ("loner", "l.py")],
            &[(0, 2), (1, 2)],
        );
        let result = pagerank(&g, 0.85).unwrap();
        assert!(result.scores[2] > result.scores[3]);
    }

    #[test]
    fn test_sink_node_preserves_relative_ranking() {
        let names = [("a", "a.py"), ("b", "b.py"), ("c", "c.py")];
        let edges = [(0, 1), (2, 1), (0, 2)];
        let base = pagerank(&graph(&names, &edges), 0.85).unwrap();

        let with_sink = pagerank(
            &graph(
                &[("a", "a.py"), ("b", "b.py"), ("c", "c.py"), ("sink", "s.py")],
                &edges,
            ),
            0.85,
        )
        .unwrap();

        // b > c > a must hold in both.
        let order = |s: &[f64]| {
            let mut idx = [0usize, 1, 2];
            idx.sort_by(|&x, &y| s[y].partial_cmp(&s[x]).unwrap());
            idx
        };
        assert_eq!(order(&base.scores), order(&with_sink.scores[..3]));
    }

    #[test]
    fn test_cycle_converges() {
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("c", "c.py")],
            &[(0, 1), (1, 2), (2, 0)],
        );
        let result = pagerank(&g, adaptive_alpha(1.0)).unwrap();
        // Symmetric cycle: all equal.
        assert!((result.scores[0] - result.scores[1]).abs() < 1e-6);
        assert!((result.scores[1] - result.scores[2]).abs() < 1e-6);
    }

    #[test]
    fn test_degree_fallback_normalized() {
        let g = graph(&[("a", "a.py"), ("b", "b.py")], &[(0, 1)]);
        let result = degree_fallback(&g);
        let sum: f64 = result.scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(result.scores[0], result.scores[1]);
    }

    #[test]
    fn test_empty_graph() {
        let g = graph(&[], &[]);
        assert!(pagerank(&g, 0.85).unwrap().scores.is_empty());
        assert!(degree_fallback(&g).scores.is_empty());
    }
}
