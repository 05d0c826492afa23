//! Dead-code detection: unreferenced exports, confidence tiers,
//! removal dispositions, dead clusters, and extinction cascades.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{DepGraph, FileGraph};

/// Names that frameworks and runtimes invoke without an edge in the
/// graph; flagging them for deletion would be noise.
const ENTRY_NAMES: &[&str] = &[
    "main", "run", "start", "stop", "setup", "teardown", "init", "activate", "deactivate",
    "install", "uninstall", "register", "configure",
];

const ENTRY_FILE_STEMS: &[&str] = &["main", "index", "app", "cli", "server", "__main__"];

const API_VERB_PREFIXES: &[&str] = &[
    "get", "set", "create", "update", "delete", "handle", "on", "fetch", "list", "add", "remove",
];

const BARREL_FILES: &[&str] = &["mod.rs", "lib.rs", "__init__.py"];

/// How far to chase importer-of-importer chains when deciding whether
/// a same-named symbol keeps a candidate alive through re-exports.
const ALIVENESS_HOPS: usize = 3;

/// Recommended disposition for a dead-code candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadAction {
    Safe,
    Review,
    Intentional,
}

impl DeadAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadAction::Safe => "SAFE",
            DeadAction::Review => "REVIEW",
            DeadAction::Intentional => "INTENTIONAL",
        }
    }
}

/// Confidence tier from file-level visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadTier {
    /// The file is imported somewhere, so the symbol is visible yet
    /// unused.
    High,
    /// Nobody imports the file; it could be an untracked entry point.
    Low,
}

#[derive(Debug, Clone)]
pub struct DeadCandidate {
    pub node: u32,
    pub symbol_id: i64,
    pub name: String,
    pub file_path: String,
    pub tier: DeadTier,
    pub action: DeadAction,
    pub confidence_pct: u8,
    pub reason: String,
}

/// One step of an extinction cascade.
#[derive(Debug, Clone)]
pub struct CascadeEntry {
    pub node: u32,
    pub name: String,
    pub file_path: String,
    pub reason: String,
}

fn file_stem(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.split_once('.').map(|(stem, _)| stem).unwrap_or(base)
}

fn is_barrel(path: &str) -> bool {
    let base = path.rsplit('/').next().unwrap_or(path);
    BARREL_FILES.contains(&base) || file_stem(path) == "index"
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn has_api_verb_prefix(name: &str) -> bool {
    for verb in API_VERB_PREFIXES {
        if let Some(rest) = name.strip_prefix(verb) {
            // snake_case (get_user) or camelCase (getUser).
            if rest.starts_with('_') || rest.chars().next().map_or(false, |c| c.is_uppercase()) {
                return true;
            }
        }
    }
    false
}

/// First-match-wins disposition heuristics.
fn disposition(name: &str, file_path: &str, file_imported: bool) -> (DeadAction, u8, String) {
    let lowered = name.to_lowercase();
    if ENTRY_NAMES.contains(&lowered.as_str()) {
        return (
            DeadAction::Intentional,
            60,
            "entry-point or lifecycle name".to_string(),
        );
    }
    if is_dunder(name) {
        return (DeadAction::Intentional, 60, "dunder-style name".to_string());
    }
    if !file_imported && ENTRY_FILE_STEMS.contains(&file_stem(file_path)) {
        return (
            DeadAction::Intentional,
            60,
            "entry-point file with no importers".to_string(),
        );
    }
    if has_api_verb_prefix(name) {
        return (
            DeadAction::Review,
            70,
            "API-verb naming suggests external callers".to_string(),
        );
    }
    if is_barrel(file_path) {
        return (
            DeadAction::Review,
            70,
            "lives in a barrel/index file".to_string(),
        );
    }
    if file_imported {
        return (
            DeadAction::Safe,
            80,
            "file is imported but symbol is unused".to_string(),
        );
    }
    if name.starts_with('_') {
        return (
            DeadAction::Safe,
            95,
            "private naming convention".to_string(),
        );
    }
    (DeadAction::Safe, 90, "no usage signal found".to_string())
}

/// Importer files reachable within `hops` reverse file-edge steps.
fn reachable_importers(files: &FileGraph, start: u32, hops: usize) -> HashSet<u32> {
    let mut reached = HashSet::new();
    let mut frontier = vec![start];
    for _ in 0..hops {
        let mut next = Vec::new();
        for &file in &frontier {
            for &importer in files.importers(file) {
                if reached.insert(importer) {
                    next.push(importer);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    reached
}

/// Find exported, callable/type symbols with zero incoming edges,
/// filter re-export false positives, and attach dispositions. Sorted
/// by file path then name.
pub fn dead_candidates(graph: &DepGraph, files: &FileGraph) -> Vec<DeadCandidate> {
    // Same-named symbols that ARE referenced, by name, with the files
    // their references come from.
    let mut referenced_from: HashMap<&str, HashSet<i64>> = HashMap::new();
    for (node, sources) in graph.incoming.iter().enumerate() {
        if sources.is_empty() {
            continue;
        }
        let entry = referenced_from
            .entry(graph.node(node as u32).name.as_str())
            .or_default();
        for &src in sources {
            entry.insert(graph.node(src).file_id);
        }
    }

    let mut out = Vec::new();
    for node in 0..graph.len() as u32 {
        let data = graph.node(node);
        if !data.exported
            || !data.kind.is_callable_or_type()
            || !graph.incoming[node as usize].is_empty()
        {
            continue;
        }

        let file_node = files.index_of(data.file_id);
        let imported = file_node
            .map(|f| !files.importers(f).is_empty())
            .unwrap_or(false);

        // Re-export chains: a same-named symbol referenced from a file
        // that (transitively) imports ours keeps this one alive.
        if imported {
            if let (Some(file_node), Some(referencing_files)) =
                (file_node, referenced_from.get(data.name.as_str()))
            {
                let reachable = reachable_importers(files, file_node, ALIVENESS_HOPS);
                let alive = reachable
                    .iter()
                    .any(|&f| referencing_files.contains(&files.files[f as usize].0));
                if alive {
                    continue;
                }
            }
        }

        let (action, confidence_pct, reason) = disposition(&data.name, &data.file_path, imported);
        out.push(DeadCandidate {
            node,
            symbol_id: data.symbol_id,
            name: data.name.clone(),
            file_path: data.file_path.clone(),
            tier: if imported { DeadTier::High } else { DeadTier::Low },
            action,
            confidence_pct,
            reason,
        });
    }
    out.sort_by(|a, b| (&a.file_path, &a.name).cmp(&(&b.file_path, &b.name)));
    out
}

/// Connected components (size >= 2) of the undirected adjacency
/// restricted to dead candidates: groups removable together.
pub fn dead_clusters(graph: &DepGraph, candidates: &[DeadCandidate]) -> Vec<Vec<u32>> {
    let dead: HashSet<u32> = candidates.iter().map(|c| c.node).collect();
    let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for &node in &dead {
        for target in graph.successors(node) {
            if dead.contains(&target) && target != node {
                adjacency.entry(node).or_default().push(target);
                adjacency.entry(target).or_default().push(node);
            }
        }
    }

    let mut seen: HashSet<u32> = HashSet::new();
    let mut clusters = Vec::new();
    let mut ordered: Vec<u32> = dead.iter().copied().collect();
    ordered.sort_unstable();
    for start in ordered {
        if seen.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(v) = queue.pop_front() {
            component.push(v);
            for &w in adjacency.get(&v).map(Vec::as_slice).unwrap_or(&[]) {
                if seen.insert(w) {
                    queue.push_back(w);
                }
            }
        }
        if component.len() >= 2 {
            component.sort_unstable();
            clusters.push(component);
        }
    }
    clusters
}

/// Simulate removing `target`: a caller joins the removed set once all
/// of its outgoing edges point at removed symbols. Breadth-first with
/// a visited set, so cyclic graphs terminate. The target itself is the
/// first entry.
pub fn extinction_cascade(graph: &DepGraph, target: u32) -> Vec<CascadeEntry> {
    let mut removed: HashSet<u32> = HashSet::from([target]);
    let mut cascade = vec![CascadeEntry {
        node: target,
        name: graph.node(target).name.clone(),
        file_path: graph.node(target).file_path.clone(),
        reason: "removal target".to_string(),
    }];

    let mut frontier = vec![target];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        // Candidates: callers of anything removed this round.
        let mut callers: Vec<u32> = frontier
            .iter()
            .flat_map(|&node| graph.predecessors(node))
            .collect();
        callers.sort_unstable();
        callers.dedup();

        for caller in callers {
            if removed.contains(&caller) {
                continue;
            }
            let callees = graph.successors(caller);
            if callees.is_empty() || !callees.iter().all(|c| removed.contains(c)) {
                continue;
            }
            removed.insert(caller);
            let last_callee = graph.node(*callees.last().unwrap_or(&target)).name.clone();
            cascade.push(CascadeEntry {
                node: caller,
                name: graph.node(caller).name.clone(),
                file_path: graph.node(caller).file_path.clone(),
                reason: format!("all callees removed (last: {last_callee})"),
            });
            next.push(caller);
        }
        frontier = next;
    }
    cascade
}
