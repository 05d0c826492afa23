//! Engine facade: the indexing write path and the query surface.
//!
//! `reindex` is the sole mutator. Every query entry point checks
//! freshness first: a read-write engine quietly rebuilds what changed,
//! a read-only engine fails fast with a stale-index error instead.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{
    dead_candidates, dead_clusters, extinction_cascade, rank_risk, score_debt, CascadeEntry,
    DeadCandidate, DebtReport, FileDebtInput, RiskConfig, RiskEntry,
};
use crate::change::{count_lines, detect_changes, walk_supported, ChangeSet, FileSnapshot};
use crate::complexity::file_complexity;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::extract::{Extraction, ExtractorRegistry};
use crate::graph::{
    adaptive_alpha, betweenness, communities, compare_with_directories, cycle_ratio, cycles,
    degree_fallback, degrees, layers, pagerank, resolve_symbol, shortest_path, ClusterReport,
    Community, Cycle, DepGraph, FileGraph, LayerReport, PathHop, Resolution,
};
use crate::history::{ingest_history, CommitRecord, HistorySummary};
use crate::store::{ClusterRow, MetricsRow, SymbolStore};

/// Most candidates carried on an ambiguous-symbol error.
const AMBIGUOUS_CANDIDATE_CAP: usize = 10;

/// Counts reported by one `reindex` run.
#[derive(Debug, Default, Clone)]
pub struct IndexSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub extraction_failures: usize,
    /// True when nothing changed and the run was skipped entirely.
    pub skipped: bool,
    pub analytics: AnalyticsSummary,
}

/// What the analytics pass actually computed.
#[derive(Debug, Default, Clone)]
pub struct AnalyticsSummary {
    pub nodes: usize,
    pub edges: usize,
    pub pagerank_alpha: f64,
    pub pagerank_fallback: bool,
    pub betweenness_approximate: bool,
    pub community_count: usize,
    pub community_fallback: bool,
}

/// Outcome of a path query.
#[derive(Debug)]
pub enum PathQuery {
    Path(Vec<PathHop>),
    /// Name matched several symbols; (name, file_path) per candidate.
    Ambiguous(Vec<(String, String)>),
    NotFound,
}

/// Blast radius of a symbol: everything transitively depending on it.
#[derive(Debug, Clone)]
pub struct ImpactReport {
    pub symbol: String,
    pub file_path: String,
    /// Symbols directly referencing the target.
    pub direct_dependents: Vec<String>,
    pub affected_symbols: usize,
    pub affected_files: Vec<String>,
}

struct ExtractedFile {
    rel_path: String,
    language: Option<String>,
    hash: String,
    mtime: f64,
    line_count: i64,
    extraction: Extraction,
}

/// The engine owns one store connection and borrows the extractor
/// registry built at process start.
#[derive(Debug)]
pub struct Engine<'r> {
    config: EngineConfig,
    registry: &'r ExtractorRegistry,
    store: SymbolStore,
    cancel: Arc<AtomicBool>,
}

impl<'r> Engine<'r> {
    /// Open read-write, creating the index directory and schema on
    /// first use.
    pub fn open(config: EngineConfig, registry: &'r ExtractorRegistry) -> Result<Self> {
        let store = SymbolStore::open(config.db_path())?;
        Ok(Self {
            config,
            registry,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open read-only, fail-fast: errs now when the index is missing
    /// and later when a query finds it stale.
    pub fn open_readonly(config: EngineConfig, registry: &'r ExtractorRegistry) -> Result<Self> {
        let store = SymbolStore::open_readonly(config.db_path())?;
        Ok(Self {
            config,
            registry,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked between long computations; set from another thread
    /// to stop a pass early.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    fn scan(&self) -> Result<(Vec<FileSnapshot>, ChangeSet)> {
        let snapshots = walk_supported(&self.config, |p| self.registry.supports(p))?;
        let recorded = self.store.recorded_fingerprints()?;
        let changes = detect_changes(&snapshots, &recorded);
        Ok((snapshots, changes))
    }

    /// Rebuild queries' view of the world: incremental unless `force`,
    /// in which case every supported file is re-extracted.
    pub fn reindex(&self, force: bool) -> Result<IndexSummary> {
        let (snapshots, mut changes) = self.scan()?;
        if force {
            changes.modified = snapshots
                .iter()
                .map(|s| s.rel_path.clone())
                .filter(|p| !changes.added.contains(p))
                .collect();
            changes.unchanged.clear();
        }

        let mut summary = IndexSummary {
            added: changes.added.len(),
            modified: changes.modified.len(),
            removed: changes.removed.len(),
            unchanged: changes.unchanged.len(),
            ..Default::default()
        };
        if changes.is_empty() && !force {
            debug!("index is current, skipping");
            summary.skipped = true;
            return Ok(summary);
        }
        info!(
            added = summary.added,
            modified = summary.modified,
            removed = summary.removed,
            "indexing"
        );

        let dirty = changes.dirty();
        let by_path: HashMap<&str, &FileSnapshot> = snapshots
            .iter()
            .map(|s| (s.rel_path.as_str(), s))
            .collect();

        // Extraction runs outside the transaction, in parallel. Only
        // the registry crosses threads; the store stays on this one.
        let registry = self.registry;
        let extracted: Vec<std::result::Result<ExtractedFile, String>> = dirty
            .par_iter()
            .filter_map(|path| by_path.get(path.as_str()))
            .map(|snap| extract_snapshot(registry, snap).map_err(|e| format!("{e:#}")))
            .collect();

        // Importers of every touched file, captured before symbol
        // replacement invalidates their edges.
        let mut importer_ids: HashSet<i64> = HashSet::new();
        let mut touched_ids: HashSet<i64> = HashSet::new();
        for path in dirty.iter().chain(changes.removed.iter()) {
            if let Some(row) = self.store.file_by_path(path)? {
                touched_ids.insert(row.id);
                importer_ids.extend(self.store.importers_of_file(row.id)?);
            }
        }

        let tx = self.store.begin()?;
        for path in &changes.removed {
            self.store.delete_file(path)?;
        }

        let mut pending_refs: Vec<(i64, Extraction)> = Vec::new();
        for result in extracted {
            match result {
                Err(reason) => {
                    warn!(error = %reason, "extraction failed, skipping file");
                    summary.extraction_failures += 1;
                }
                Ok(file) => {
                    let file_id = self.store.upsert_file(
                        &file.rel_path,
                        file.language.as_deref(),
                        &file.hash,
                        file.mtime,
                        file.line_count,
                    )?;
                    touched_ids.insert(file_id);
                    self.store
                        .replace_file_symbols(file_id, &file.extraction.symbols)?;
                    pending_refs.push((file_id, file.extraction));
                }
            }
        }

        // Importer files whose edges were cascaded away get their
        // references re-resolved from a fresh extraction.
        for importer_id in importer_ids {
            if touched_ids.contains(&importer_id) {
                continue;
            }
            let Some(row) = self.store.file_by_id(importer_id)? else {
                continue;
            };
            match self.extract_from_disk(&row.path) {
                Ok(extraction) => {
                    self.store.delete_outgoing_edges(importer_id)?;
                    pending_refs.push((importer_id, extraction));
                }
                Err(err) => debug!(path = %row.path, error = %err, "importer re-resolution skipped"),
            }
        }

        // All symbols are in place; resolve references last so
        // cross-file targets exist.
        for (file_id, extraction) in &pending_refs {
            let (_, dropped) = self
                .store
                .insert_references(*file_id, &extraction.references)?;
            if dropped > 0 {
                debug!(file_id, dropped, "unresolved references dropped");
            }
        }
        self.store.rebuild_file_edges()?;

        for path in &dirty {
            let Some(row) = self.store.file_by_path(path)? else {
                continue;
            };
            let abs = self.config.root.join(path);
            if let Ok(score) = file_complexity(&abs, self.config.complexity_byte_cap) {
                self.store.set_file_complexity(row.id, score)?;
            }
        }
        tx.commit()?;

        summary.analytics = self.run_analytics()?;
        Ok(summary)
    }

    fn extract_from_disk(&self, rel_path: &str) -> Result<Extraction> {
        let abs = self.config.root.join(rel_path);
        let bytes = std::fs::read(&abs).with_context(|| format!("reading {rel_path}"))?;
        let extractor = self
            .registry
            .for_path(&abs)
            .ok_or_else(|| anyhow::anyhow!("no extractor for {rel_path}"))?;
        extractor.extract(rel_path, &bytes)
    }

    /// Rebuild graph metrics and cluster assignments from the current
    /// store contents; write-back replaces both tables atomically.
    pub fn run_analytics(&self) -> Result<AnalyticsSummary> {
        let graph = DepGraph::from_store(&self.store)?;
        let mut summary = AnalyticsSummary {
            nodes: graph.len(),
            edges: self.store.count_edges()?,
            ..Default::default()
        };
        if graph.is_empty() {
            let tx = self.store.begin()?;
            self.store.replace_graph_metrics(&[])?;
            self.store.replace_clusters(&[])?;
            tx.commit()?;
            return Ok(summary);
        }

        let ratio = cycle_ratio(&graph);
        let alpha = adaptive_alpha(ratio);
        summary.pagerank_alpha = alpha;
        let ranks = match pagerank(&graph, alpha) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "pagerank degraded to degree fallback");
                summary.pagerank_fallback = true;
                degree_fallback(&graph)
            }
        };
        let degree_pairs = degrees(&graph);
        let centrality = betweenness(&graph, &self.cancel)?;
        summary.betweenness_approximate = centrality.approximate;

        let (found, community_fallback) = communities(&graph);
        summary.community_fallback = community_fallback;
        summary.community_count = found.len();

        let metric_rows: Vec<MetricsRow> = (0..graph.len())
            .map(|i| MetricsRow {
                symbol_id: graph.node(i as u32).symbol_id,
                pagerank: ranks.scores[i],
                in_degree: degree_pairs[i].0,
                out_degree: degree_pairs[i].1,
                betweenness: centrality.scores[i],
            })
            .collect();
        let cluster_rows: Vec<ClusterRow> = found
            .iter()
            .flat_map(|community| {
                community.members.iter().map(|&node| ClusterRow {
                    symbol_id: graph.node(node).symbol_id,
                    cluster_id: community.id,
                    cluster_label: Some(community.label.clone()),
                })
            })
            .collect();

        let tx = self.store.begin()?;
        self.store.replace_graph_metrics(&metric_rows)?;
        self.store.replace_clusters(&cluster_rows)?;
        tx.commit()?;

        info!(
            nodes = summary.nodes,
            alpha = summary.pagerank_alpha,
            communities = summary.community_count,
            approximate_betweenness = summary.betweenness_approximate,
            "analytics pass complete"
        );
        Ok(summary)
    }

    /// Bring the index up to date, or fail fast in read-only mode.
    pub fn ensure_fresh(&self) -> Result<()> {
        if self.store.is_readonly() {
            let (_, changes) = self.scan()?;
            if !changes.is_empty() {
                let changed = changes.added.len() + changes.modified.len() + changes.removed.len();
                return Err(EngineError::StaleIndex { changed }.into());
            }
            return Ok(());
        }
        self.reindex(false)?;
        Ok(())
    }

    /// Replace stored commit history and derived activity stats.
    pub fn ingest_commits(&self, commits: &[CommitRecord]) -> Result<HistorySummary> {
        let tx = self.store.begin()?;
        let summary = ingest_history(&self.store, commits, self.config.max_commits)?;
        tx.commit()?;
        info!(commits = summary.commits, "history ingested");
        Ok(summary)
    }

    // ----- query surface -----

    pub fn dead_code(&self) -> Result<Vec<DeadCandidate>> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let files = FileGraph::from_store(&self.store)?;
        Ok(dead_candidates(&graph, &files))
    }

    /// Groups of dead symbols only referencing each other, as names.
    pub fn dead_code_clusters(&self) -> Result<Vec<Vec<String>>> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let files = FileGraph::from_store(&self.store)?;
        let candidates = dead_candidates(&graph, &files);
        Ok(dead_clusters(&graph, &candidates)
            .into_iter()
            .map(|cluster| {
                cluster
                    .into_iter()
                    .map(|node| graph.node(node).name.clone())
                    .collect()
            })
            .collect())
    }

    /// Removal simulation for a named symbol.
    pub fn cascade(&self, name: &str) -> Result<Vec<CascadeEntry>> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let node = self.resolve_one(&graph, name)?;
        Ok(extinction_cascade(&graph, node))
    }

    pub fn cycle_report(&self) -> Result<Vec<Cycle>> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        Ok(cycles(&graph))
    }

    pub fn layer_report(&self) -> Result<LayerReport> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        Ok(layers(&graph))
    }

    pub fn community_report(&self) -> Result<(Vec<Community>, Vec<ClusterReport>)> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let (found, _) = communities(&graph);
        let reports = compare_with_directories(&graph, &found);
        Ok((found, reports))
    }

    pub fn path(&self, from: &str, to: &str) -> Result<PathQuery> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let start = match resolve_symbol(&graph, from) {
            Resolution::One(node) => node,
            Resolution::Ambiguous(list) => return Ok(ambiguous(&graph, list)),
            Resolution::NotFound => return Ok(PathQuery::NotFound),
        };
        let goal = match resolve_symbol(&graph, to) {
            Resolution::One(node) => node,
            Resolution::Ambiguous(list) => return Ok(ambiguous(&graph, list)),
            Resolution::NotFound => return Ok(PathQuery::NotFound),
        };
        Ok(match shortest_path(&graph, start, goal) {
            Some(hops) => PathQuery::Path(hops),
            None => PathQuery::NotFound,
        })
    }

    /// Reverse transitive closure: who breaks when this symbol changes.
    pub fn impact(&self, name: &str) -> Result<ImpactReport> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let target = self.resolve_one(&graph, name)?;

        let direct: Vec<String> = graph
            .predecessors(target)
            .into_iter()
            .map(|n| graph.node(n).name.clone())
            .collect();

        let mut seen = HashSet::from([target]);
        let mut queue = VecDeque::from([target]);
        let mut files: HashSet<String> = HashSet::new();
        while let Some(node) = queue.pop_front() {
            for pred in graph.predecessors(node) {
                if seen.insert(pred) {
                    files.insert(graph.node(pred).file_path.clone());
                    queue.push_back(pred);
                }
            }
        }
        let mut affected_files: Vec<String> = files.into_iter().collect();
        affected_files.sort_unstable();

        let data = graph.node(target);
        Ok(ImpactReport {
            symbol: data.name.clone(),
            file_path: data.file_path.clone(),
            direct_dependents: direct,
            affected_symbols: seen.len() - 1,
            affected_files,
        })
    }

    pub fn debt(&self) -> Result<DebtReport> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let files_graph = FileGraph::from_store(&self.store)?;
        let stats = self.store.all_file_stats()?;
        let candidates = dead_candidates(&graph, &files_graph);

        let mut cyclic_files: HashSet<i64> = HashSet::new();
        for cycle in cycles(&graph) {
            for node in cycle.members {
                cyclic_files.insert(graph.node(node).file_id);
            }
        }

        let mut degree_by_file: HashMap<i64, i64> = HashMap::new();
        let mut exports_by_file: HashMap<i64, usize> = HashMap::new();
        for (i, (in_deg, out_deg)) in degrees(&graph).iter().enumerate() {
            let data = graph.node(i as u32);
            *degree_by_file.entry(data.file_id).or_default() += in_deg + out_deg;
            if data.exported {
                *exports_by_file.entry(data.file_id).or_default() += 1;
            }
        }
        let mut dead_by_file: HashMap<&str, usize> = HashMap::new();
        for candidate in &candidates {
            *dead_by_file.entry(candidate.file_path.as_str()).or_default() += 1;
        }

        let inputs: Vec<FileDebtInput> = self
            .store
            .all_files()?
            .into_iter()
            .map(|row| {
                let stat = stats.get(&row.id);
                FileDebtInput {
                    file_id: row.id,
                    complexity: stat.map(|s| s.complexity).unwrap_or(0.0),
                    churn: stat.map(|s| s.total_churn).unwrap_or(0),
                    in_cycle: cyclic_files.contains(&row.id),
                    total_degree: degree_by_file.get(&row.id).copied().unwrap_or(0),
                    dead_exports: dead_by_file.get(row.path.as_str()).copied().unwrap_or(0),
                    total_exports: exports_by_file.get(&row.id).copied().unwrap_or(0),
                    path: row.path,
                }
            })
            .collect();
        Ok(score_debt(&inputs))
    }

    pub fn risk(&self, config: &RiskConfig) -> Result<Vec<RiskEntry>> {
        self.ensure_fresh()?;
        let graph = DepGraph::from_store(&self.store)?;
        let metrics = self.store.graph_metrics()?;
        Ok(rank_risk(&graph, &metrics, config))
    }

    fn resolve_one(&self, graph: &DepGraph, name: &str) -> Result<u32> {
        match resolve_symbol(graph, name) {
            Resolution::One(node) => Ok(node),
            Resolution::Ambiguous(list) => Err(EngineError::AmbiguousSymbol {
                name: name.to_string(),
                candidates: list
                    .into_iter()
                    .take(AMBIGUOUS_CANDIDATE_CAP)
                    .map(|node| {
                        let data = graph.node(node);
                        (data.name.clone(), data.file_path.clone())
                    })
                    .collect(),
            }
            .into()),
            Resolution::NotFound => {
                anyhow::bail!("symbol '{name}' not found in the index")
            }
        }
    }
}

fn extract_snapshot(registry: &ExtractorRegistry, snap: &FileSnapshot) -> Result<ExtractedFile> {
    let bytes =
        std::fs::read(&snap.abs_path).with_context(|| format!("reading {}", snap.rel_path))?;
    let extractor = registry
        .for_path(&snap.abs_path)
        .ok_or_else(|| EngineError::Extraction {
            path: snap.rel_path.clone(),
            reason: "no extractor claims this path".to_string(),
        })?;
    let extraction = extractor
        .extract(&snap.rel_path, &bytes)
        .map_err(|e| EngineError::Extraction {
            path: snap.rel_path.clone(),
            reason: format!("{e:#}"),
        })?;
    Ok(ExtractedFile {
        rel_path: snap.rel_path.clone(),
        language: registry.detect_language(&snap.abs_path).map(str::to_string),
        hash: crate::change::hash_file(&snap.abs_path)?,
        mtime: snap.mtime,
        line_count: count_lines(&bytes) as i64,
        extraction,
    })
}

fn ambiguous(graph: &DepGraph, list: Vec<u32>) -> PathQuery {
    PathQuery::Ambiguous(
        list.into_iter()
            .map(|node| {
                let data = graph.node(node);
                (data.name.clone(), data.file_path.clone())
            })
            .collect(),
    )
}
