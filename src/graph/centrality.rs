//! Degree and betweenness centrality (Brandes, with pivot sampling
//! on large graphs).

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use super::DepGraph;
use crate::error::EngineError;

/// Exact betweenness above this size costs more than the estimate is
/// worth; switch to pivot sampling.
const EXACT_LIMIT: usize = 1000;

/// Betweenness scores per node (arena order). `approximate` is set
/// when pivot sampling was used so output can say so.
#[derive(Debug, Clone)]
pub struct BetweennessResult {
    pub scores: Vec<f64>,
    pub approximate: bool,
    pub pivots: usize,
}

/// Exact (in_degree, out_degree) per node, multi-edges counted.
pub fn degrees(graph: &DepGraph) -> Vec<(i64, i64)> {
    (0..graph.len())
        .map(|i| (graph.incoming[i].len() as i64, graph.out[i].len() as i64))
        .collect()
}

/// Brandes betweenness over the directed graph, unnormalized.
///
/// Graphs over the exact limit are estimated from `max(200, 5·√n)`
/// pivot sources chosen by a fixed stride over the arena order, which
/// keeps runs deterministic without a random seed. The cancel flag is
/// checked between source computations.
pub fn betweenness(graph: &DepGraph, cancel: &AtomicBool) -> Result<BetweennessResult> {
    let n = graph.len();
    let mut scores = vec![0.0f64; n];
    if n < 3 {
        return Ok(BetweennessResult {
            scores,
            approximate: false,
            pivots: n,
        });
    }

    let successors: Vec<Vec<u32>> = (0..n as u32).map(|i| graph.successors(i)).collect();

    let (sources, approximate) = if n <= EXACT_LIMIT {
        ((0..n as u32).collect::<Vec<u32>>(), false)
    } else {
        let k = (200usize).max((5.0 * (n as f64).sqrt()) as usize).min(n);
        let stride = n as f64 / k as f64;
        let mut picked: Vec<u32> = (0..k).map(|i| (i as f64 * stride) as u32).collect();
        picked.dedup();
        (picked, true)
    };
    let pivots = sources.len();

    // Scratch buffers reused across sources.
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![-1i64; n];
    let mut delta = vec![0.0f64; n];
    let mut pred: Vec<Vec<u32>> = vec![Vec::new(); n];

    for &source in &sources {
        if cancel.load(Ordering::Relaxed) {
            return Err(EngineError::Cancelled.into());
        }
        for i in 0..n {
            sigma[i] = 0.0;
            dist[i] = -1;
            delta[i] = 0.0;
            pred[i].clear();
        }
        sigma[source as usize] = 1.0;
        dist[source as usize] = 0;

        let mut order: Vec<u32> = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &w in &successors[v as usize] {
                if dist[w as usize] < 0 {
                    dist[w as usize] = dist[v as usize] + 1;
                    queue.push_back(w);
                }
                if dist[w as usize] == dist[v as usize] + 1 {
                    sigma[w as usize] += sigma[v as usize];
                    pred[w as usize].push(v);
                }
            }
        }

        for &w in order.iter().rev() {
            for &v in &pred[w as usize] {
                delta[v as usize] += sigma[v as usize] / sigma[w as usize]
                    * (1.0 + delta[w as usize]);
            }
            if w != source {
                scores[w as usize] += delta[w as usize];
            }
        }
    }

    // Scale sampled scores up to full-graph magnitude.
    if approximate && pivots > 0 {
        let scale = n as f64 / pivots as f64;
        for score in &mut scores {
            *score *= scale;
        }
    }

    Ok(BetweennessResult {
        scores,
        approximate,
        pivots,
    })
}
