//! Symbol resolution and shortest-path queries.

use std::collections::VecDeque;

use super::DepGraph;
use crate::extract::EdgeKind;

/// Outcome of resolving a user-supplied name against the graph.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Exactly one symbol matched.
    One(u32),
    /// Multiple matched; callers present the list, never guess.
    Ambiguous(Vec<u32>),
    NotFound,
}

/// One step of a reported path.
#[derive(Debug, Clone)]
pub struct PathHop {
    pub node: u32,
    pub symbol_id: i64,
    pub name: String,
    pub file_path: String,
    /// Edge kind linking this hop to the previous one; None on the
    /// first hop. Undirected-fallback hops may report the kind of a
    /// reversed edge.
    pub via: Option<EdgeKind>,
}

/// Resolve a name: exact name, exact qualified name, then substring
/// over both (capped at 50 candidates), first non-empty tier wins.
pub fn resolve_symbol(graph: &DepGraph, name: &str) -> Resolution {
    let exact: Vec<u32> = (0..graph.len() as u32)
        .filter(|&i| graph.node(i).name == name)
        .collect();
    let tiers = [
        exact,
        (0..graph.len() as u32)
            .filter(|&i| graph.node(i).qualified_name.as_deref() == Some(name))
            .collect(),
        (0..graph.len() as u32)
            .filter(|&i| {
                let node = graph.node(i);
                node.name.contains(name)
                    || node
                        .qualified_name
                        .as_deref()
                        .map(|q| q.contains(name))
                        .unwrap_or(false)
            })
            .take(50)
            .collect(),
    ];
    for tier in tiers {
        match tier.len() {
            0 => continue,
            1 => return Resolution::One(tier[0]),
            _ => return Resolution::Ambiguous(tier),
        }
    }
    Resolution::NotFound
}

/// BFS shortest path from `start` to `goal`, directed first, then the
/// undirected projection. `None` when unreachable both ways.
pub fn shortest_path(graph: &DepGraph, start: u32, goal: u32) -> Option<Vec<PathHop>> {
    if start == goal {
        return Some(vec![hop(graph, start, None)]);
    }
    bfs(graph, start, goal, false).or_else(|| bfs(graph, start, goal, true))
}

fn bfs(graph: &DepGraph, start: u32, goal: u32, undirected: bool) -> Option<Vec<PathHop>> {
    let n = graph.len();
    let mut prev: Vec<Option<u32>> = vec![None; n];
    let mut seen = vec![false; n];
    seen[start as usize] = true;

    let mut queue = VecDeque::new();
    queue.push_back(start);
    'search: while let Some(v) = queue.pop_front() {
        let mut neighbors = graph.successors(v);
        if undirected {
            neighbors.extend(graph.predecessors(v));
        }
        for w in neighbors {
            if seen[w as usize] {
                continue;
            }
            seen[w as usize] = true;
            prev[w as usize] = Some(v);
            if w == goal {
                break 'search;
            }
            queue.push_back(w);
        }
    }
    if !seen[goal as usize] {
        return None;
    }

    let mut order = vec![goal];
    let mut cursor = goal;
    while let Some(p) = prev[cursor as usize] {
        order.push(p);
        cursor = p;
    }
    order.reverse();

    let mut hops = Vec::with_capacity(order.len());
    for (i, &node) in order.iter().enumerate() {
        let via = if i == 0 {
            None
        } else {
            edge_kind_between(graph, order[i - 1], node)
        };
        hops.push(hop(graph, node, via));
    }
    Some(hops)
}

/// Kind of some edge between the pair, forward preferred; undirected
/// paths may only have the reversed edge.
fn edge_kind_between(graph: &DepGraph, from: u32, to: u32) -> Option<EdgeKind> {
    graph.out[from as usize]
        .iter()
        .find(|&&(t, _)| t == to)
        .or_else(|| graph.out[to as usize].iter().find(|&&(t, _)| t == from))
        .map(|&(_, kind)| kind)
}

fn hop(graph: &DepGraph, node: u32, via: Option<EdgeKind>) -> PathHop {
    let data = graph.node(node);
    PathHop {
        node,
        symbol_id: data.symbol_id,
        name: data.name.clone(),
        file_path: data.file_path.clone(),
        via,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::graph;
    use super::*;

    #[test]
    fn test_resolution_tiers() {
        let g = graph(
            &[("alpha", "a.py"), ("alphabet", "b.py"), ("beta", "c.py")],
            &[],
        );
        assert!(matches!(resolve_symbol(&g, "alpha"), Resolution::One(0)));
        assert!(matches!(resolve_symbol(&g, "alph"), Resolution::Ambiguous(_)));
        assert!(matches!(resolve_symbol(&g, "zzz"), Resolution::NotFound));
    }

    #[test]
    fn test_trivial_self_path() {
        let g = graph(&[("a", "a.py")], &[]);
        let path = shortest_path(&g, 0, 0).unwrap();
        assert_eq!(path.len(), 1);
        assert!(path[0].via.is_none());
    }

    #[test]
    fn test_directed_path_with_edge_kinds() {
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("c", "c.py")],
            &[(0, 1), (1, 2)],
        );
        let path = shortest_path(&g, 0, 2).unwrap();
        let names: Vec<&str> = path.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(path[1].via, Some(EdgeKind::Calls));
        assert_eq!(path[2].via, Some(EdgeKind::Calls));
    }

    #[test]
    fn test_undirected_fallback() {
        // Only c -> a exists; a to c must use the reversed edge.
        let g = graph(&[("a", "a.py"), ("c", "c.py")], &[(1, 0)]);
        let path = shortest_path(&g, 0, 1).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].via, Some(EdgeKind::Calls));
    }

    #[test]
    fn test_unreachable_is_none() {
        let g = graph(&[("a", "a.py"), ("b", "b.py")], &[]);
        assert!(shortest_path(&g, 0, 1).is_none());
    }

    #[test]
    fn test_shortest_wins_over_longer() {
        let g = graph(
            &[("a", "a.py"), ("b", "b.py"), ("c", "c.py"), ("d", "d.py")],
            &[(0, 1), (1, 3), (0, 3), (0, 2), (2, 3)],
        );
        let path = shortest_path(&g, 0, 3).unwrap();
        assert_eq!(path.len(), 2);
    }
}
