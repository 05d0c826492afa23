//! Strongly-connected components, cycle reporting, and layer
//! assignment over the acyclic remainder.

use std::collections::{BTreeSet, HashMap};

use super::DepGraph;

/// One non-trivial strongly-connected component.
#[derive(Debug, Clone)]
pub struct Cycle {
    /// Member node indices, ascending.
    pub members: Vec<u32>,
    /// Paths of the files the cycle touches, sorted.
    pub files: Vec<String>,
}

/// Layer assignment over the acyclic portion of the graph.
#[derive(Debug, Clone, Default)]
pub struct LayerReport {
    /// node index -> layer; cyclic nodes are absent.
    pub layers: HashMap<u32, usize>,
    pub layer_count: usize,
    /// Edges (source, target) whose source layer exceeds the target's.
    pub violations: Vec<(u32, u32)>,
}

/// Tarjan's algorithm, iterative to stay off the call stack on deep
/// graphs. Returns every component; trivial singletons included.
pub fn strongly_connected_components(graph: &DepGraph) -> Vec<Vec<u32>> {
    let n = graph.len();
    let successors: Vec<Vec<u32>> = (0..n as u32).map(|i| graph.successors(i)).collect();

    const UNVISITED: i64 = -1;
    let mut index_of = vec![UNVISITED; n];
    let mut lowlink = vec![0i64; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<u32> = Vec::new();
    let mut next_index = 0i64;
    let mut components: Vec<Vec<u32>> = Vec::new();

    // (node, next-successor position) frames.
    let mut frames: Vec<(u32, usize)> = Vec::new();

    for start in 0..n as u32 {
        if index_of[start as usize] != UNVISITED {
            continue;
        }
        frames.push((start, 0));
        while let Some(top) = frames.last_mut() {
            let (v, pos) = *top;
            let v_usize = v as usize;
            if pos == 0 {
                index_of[v_usize] = next_index;
                lowlink[v_usize] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v_usize] = true;
            }
            if let Some(&w) = successors[v_usize].get(pos) {
                top.1 = pos + 1;
                let w_usize = w as usize;
                if index_of[w_usize] == UNVISITED {
                    frames.push((w, 0));
                } else if on_stack[w_usize] {
                    lowlink[v_usize] = lowlink[v_usize].min(index_of[w_usize]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                let p = parent as usize;
                lowlink[p] = lowlink[p].min(lowlink[v_usize]);
            }
            if lowlink[v_usize] == index_of[v_usize] {
                let mut component = Vec::new();
                loop {
                    let w = stack.pop().expect("tarjan stack underflow");
                    on_stack[w as usize] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }
    components
}

/// Components of size > 1, with the files they touch, ordered by
/// first member index.
pub fn cycles(graph: &DepGraph) -> Vec<Cycle> {
    let mut out: Vec<Cycle> = strongly_connected_components(graph)
        .into_iter()
        .filter(|c| c.len() > 1)
        .map(|members| {
            let files: BTreeSet<String> = members
                .iter()
                .map(|&i| graph.node(i).file_path.clone())
                .collect();
            Cycle {
                members,
                files: files.into_iter().collect(),
            }
        })
        .collect();
    out.sort_by_key(|c| c.members[0]);
    out
}

/// Fraction of nodes sitting in a non-trivial component, for the
/// adaptive PageRank damping factor.
pub fn cycle_ratio(graph: &DepGraph) -> f64 {
    if graph.is_empty() {
        return 0.0;
    }
    let cyclic: usize = strongly_connected_components(graph)
        .iter()
        .filter(|c| c.len() > 1)
        .map(|c| c.len())
        .sum();
    cyclic as f64 / graph.len() as f64
}

/// Longest-path layering (Kahn order) over the acyclic subgraph.
///
/// A node with no incoming edges sits at layer 0; otherwise one past
/// its deepest predecessor. Nodes in non-trivial components, and edges
/// touching them, are excluded. Violations are surviving edges whose
/// source layer is strictly greater than the target's.
pub fn layers(graph: &DepGraph) -> LayerReport {
    let n = graph.len();
    let mut cyclic = vec![false; n];
    for component in strongly_connected_components(graph) {
        if component.len() > 1 {
            for node in component {
                cyclic[node as usize] = true;
            }
        }
    }

    let mut in_degree = vec![0usize; n];
    let successors: Vec<Vec<u32>> = (0..n as u32)
        .map(|i| {
            if cyclic[i as usize] {
                return Vec::new();
            }
            graph
                .successors(i)
                .into_iter()
                .filter(|&t| !cyclic[t as usize])
                .collect()
        })
        .collect();
    for targets in &successors {
        for &t in targets {
            in_degree[t as usize] += 1;
        }
    }

    let mut layer = vec![0usize; n];
    let mut queue: Vec<u32> = (0..n as u32)
        .filter(|&i| !cyclic[i as usize] && in_degree[i as usize] == 0)
        .collect();
    let mut head = 0;
    while head < queue.len() {
        let v = queue[head];
        head += 1;
        for &w in &successors[v as usize] {
            let w_usize = w as usize;
            layer[w_usize] = layer[w_usize].max(layer[v as usize] + 1);
            in_degree[w_usize] -= 1;
            if in_degree[w_usize] == 0 {
                queue.push(w);
            }
        }
    }

    let mut report = LayerReport::default();
    for i in 0..n {
        if !cyclic[i] {
            report.layers.insert(i as u32, layer[i]);
            report.layer_count = report.layer_count.max(layer[i] + 1);
        }
    }
    for (src, targets) in successors.iter().enumerate() {
        for &tgt in targets {
            if layer[src] > layer[tgt as usize] {
                report.violations.push((src as u32, tgt));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::super::testutil::graph;
    use super::*;

    #[test]
    fn test_three_node_loop_is_one_cycle_no_layers() {
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("c", "c.py")],
            &[(0, 1), (1, 2), (2, 0)],
        );
        let found = cycles(&g);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].members, vec![0, 1, 2]);
        assert_eq!(found[0].files, vec!["a.py", "b.py", "c.py"]);
        assert!((cycle_ratio(&g) - 1.0).abs() < 1e-9);

        let report = layers(&g);
        assert!(report.layers.is_empty());
        assert_eq!(report.layer_count, 0);
    }

    #[test]
    fn test_chain_layers() {
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("c", "c.py")],
            &[(0, 1), (1, 2)],
        );
        assert!(cycles(&g).is_empty());
        let report = layers(&g);
        assert_eq!(report.layers[&0], 0);
        assert_eq!(report.layers[&1], 1);
        assert_eq!(report.layers[&2], 2);
        assert_eq!(report.layer_count, 3);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_diamond_takes_deepest_predecessor() {
        // a -> b -> d, a -> d: d is layer 2, not 1.
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("d", "d.py")],
            &[(0, 1), (1, 2), (0, 2)],
        );
        let report = layers(&g);
        assert_eq!(report.layers[&2], 2);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_cyclic_core_excluded_acyclic_fringe_layered() {
        // Loop b<->c, plus a -> b and c -> d. Only a and d get layers.
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("c", "c.py"), ("d", "d.py")],
            &[(1, 2), (2, 1), (0, 1), (2, 3)],
        );
        let found = cycles(&g);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].members, vec![1, 2]);
        assert!((cycle_ratio(&g) - 0.5).abs() < 1e-9);

        let report = layers(&g);
        assert_eq!(report.layers.len(), 2);
        assert_eq!(report.layers[&0], 0);
        assert_eq!(report.layers[&3], 0);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let names: Vec<(String, String)> = (0..5000)
            .map(|i| (format!("n{i}"), "f.py".to_string()))
            .collect();
        let refs: Vec<(&str, &str)> = names
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let edges: Vec<(u32, u32)> = (0..4999).map(|i| (i, i + 1)).collect();
        let g = graph(&refs, &edges);
        assert!(cycles(&g).is_empty());
        assert_eq!(layers(&g).layer_count, 5000);
    }
}
