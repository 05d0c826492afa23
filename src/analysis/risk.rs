//! Domain-weighted risk ranking.
//!
//! Static risk comes from graph position (degree and betweenness);
//! the domain weight scales it by what the symbol's name says it
//! touches. A payment-ledger function and a tooltip helper with the
//! same fan-in are not equally dangerous to change.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::extract::SymbolKind;
use crate::graph::DepGraph;
use crate::store::MetricsRow;

/// Default name-fragment weights. Financial and security fragments
/// dominate, business logic sits mid-table, presentation fragments
/// actively dampen.
const DEFAULT_DOMAINS: &[(&str, f64)] = &[
    // Financial / accounting
    ("money", 10.0),
    ("payment", 10.0),
    ("invoice", 10.0),
    ("ledger", 10.0),
    ("balance", 10.0),
    ("transaction", 10.0),
    ("credit", 10.0),
    ("debit", 10.0),
    ("tax", 10.0),
    ("vat", 10.0),
    ("accounting", 10.0),
    ("fiscal", 10.0),
    ("price", 8.0),
    ("cost", 8.0),
    ("amount", 8.0),
    ("currency", 8.0),
    ("billing", 8.0),
    ("refund", 8.0),
    ("receipt", 8.0),
    ("journal", 8.0),
    // Auth / security
    ("password", 10.0),
    ("encrypt", 10.0),
    ("decrypt", 10.0),
    ("secret", 10.0),
    ("credential", 10.0),
    ("auth", 8.0),
    ("token", 8.0),
    ("permission", 8.0),
    ("session", 6.0),
    ("login", 6.0),
    ("logout", 4.0),
    // Data integrity
    ("truncate", 8.0),
    ("delete", 6.0),
    ("destroy", 6.0),
    ("migrate", 6.0),
    ("backup", 6.0),
    ("restore", 6.0),
    ("sync", 4.0),
    ("import", 4.0),
    ("export", 4.0),
    // Business logic
    ("order", 5.0),
    ("customer", 5.0),
    ("account", 5.0),
    ("calculate", 5.0),
    ("approve", 5.0),
    ("user", 4.0),
    ("validate", 4.0),
    ("schedule", 4.0),
    ("report", 4.0),
    ("process", 3.0),
    ("notify", 3.0),
    // UI / presentation
    ("render", 0.3),
    ("display", 0.3),
    ("show", 0.3),
    ("hide", 0.3),
    ("style", 0.3),
    ("theme", 0.3),
    ("color", 0.3),
    ("icon", 0.3),
    ("modal", 0.3),
    ("tooltip", 0.3),
    ("animation", 0.3),
    ("layout", 0.3),
    ("grid", 0.3),
    ("menu", 0.3),
    ("button", 0.3),
    ("dialog", 0.3),
    ("drawer", 0.3),
    ("spinner", 0.3),
    ("badge", 0.3),
    ("card", 0.3),
    ("panel", 0.3),
    ("tab", 0.3),
];

const UI_PATH_PATTERNS: &[&str] = &[
    "components/",
    "views/",
    "pages/",
    "templates/",
    "layouts/",
    "/ui/",
    "widgets/",
    "screens/",
];

const UI_EXTENSIONS: &[&str] = &[".vue", ".svelte", ".jsx", ".tsx"];

/// Severity bucket from the adjusted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    fn from_score(score: f64) -> Self {
        if score >= 30.0 {
            Severity::Critical
        } else if score >= 15.0 {
            Severity::High
        } else if score >= 5.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// Domain-weight configuration: custom fragments merge over defaults.
#[derive(Debug, Clone, Default)]
pub struct RiskConfig {
    pub custom_weights: HashMap<String, f64>,
}

impl RiskConfig {
    fn table(&self) -> HashMap<&str, f64> {
        let mut table: HashMap<&str, f64> =
            DEFAULT_DOMAINS.iter().map(|&(k, v)| (k, v)).collect();
        for (key, &value) in &self.custom_weights {
            table.insert(key.as_str(), value);
        }
        table
    }
}

#[derive(Debug, Clone)]
pub struct RiskEntry {
    pub symbol_id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub static_risk: f64,
    pub domain_weight: f64,
    /// Fragment that set the weight, empty when neutral.
    pub domain_match: String,
    pub adjusted_risk: f64,
    pub severity: Severity,
    pub in_degree: i64,
    pub out_degree: i64,
}

/// Split an identifier into lower-cased fragments on case and word
/// boundaries: `getUserBalance` and `get_user_balance` both yield
/// [get, user, balance].
fn name_fragments(name: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                fragments.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = ch.is_uppercase()
            && (chars
                .get(i.wrapping_sub(1))
                .map(|p| p.is_lowercase() || p.is_numeric())
                .unwrap_or(false)
                || chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false)
                    && chars
                        .get(i.wrapping_sub(1))
                        .map(|p| p.is_uppercase())
                        .unwrap_or(false));
        if boundary && !current.is_empty() {
            fragments.push(std::mem::take(&mut current));
        }
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
}

/// Highest-weight fragment match, default 1 (neutral) with no match.
fn match_domain(name: &str, table: &HashMap<&str, f64>) -> (f64, String) {
    let mut best: Option<(f64, String)> = None;
    for fragment in name_fragments(name) {
        if let Some(&weight) = table.get(fragment.as_str()) {
            if best.as_ref().map(|(w, _)| weight > *w).unwrap_or(true) {
                best = Some((weight, fragment));
            }
        }
    }
    best.unwrap_or((1.0, String::new()))
}

fn is_ui_file(path: &str) -> bool {
    let lowered = path.replace('\\', "/").to_lowercase();
    UI_PATH_PATTERNS.iter().any(|p| lowered.contains(p))
        || UI_EXTENSIONS.iter().any(|e| lowered.ends_with(e))
}

/// Rank symbols by domain-adjusted risk, descending. Only callable or
/// type kinds with at least one edge participate.
pub fn rank_risk(
    graph: &DepGraph,
    metrics: &HashMap<i64, MetricsRow>,
    config: &RiskConfig,
) -> Vec<RiskEntry> {
    let table = config.table();

    let eligible: Vec<(u32, &MetricsRow)> = (0..graph.len() as u32)
        .filter_map(|node| {
            let data = graph.node(node);
            let row = metrics.get(&data.symbol_id)?;
            if data.kind.is_callable_or_type() && row.in_degree + row.out_degree > 0 {
                Some((node, row))
            } else {
                None
            }
        })
        .collect();
    if eligible.is_empty() {
        return Vec::new();
    }

    let max_degree = eligible
        .iter()
        .map(|(_, r)| r.in_degree + r.out_degree)
        .max()
        .unwrap_or(1)
        .max(1) as f64;
    let max_betweenness = eligible
        .iter()
        .map(|(_, r)| r.betweenness)
        .fold(0.0f64, f64::max);
    // Substitute 1 only when no symbol has any betweenness at all;
    // fractional maxima still normalize the top symbol to a full term.
    let max_betweenness = if max_betweenness > 0.0 {
        max_betweenness
    } else {
        1.0
    };

    let mut entries: Vec<RiskEntry> = eligible
        .into_iter()
        .map(|(node, row)| {
            let data = graph.node(node);
            let total_degree = (row.in_degree + row.out_degree) as f64;
            let static_risk =
                total_degree / max_degree * 5.0 + row.betweenness / max_betweenness * 5.0;

            let (mut domain_weight, domain_match) = match_domain(&data.name, &table);
            // A business verb inside a UI component is usually a false
            // positive ("restore" in a dialog); halve it, floor 1.
            if domain_weight > 1.0 && is_ui_file(&data.file_path) {
                domain_weight = (domain_weight * 0.5).max(1.0);
            }
            let adjusted_risk = static_risk * domain_weight;

            RiskEntry {
                symbol_id: data.symbol_id,
                name: data.name.clone(),
                kind: data.kind,
                file_path: data.file_path.clone(),
                static_risk,
                domain_weight,
                domain_match,
                adjusted_risk,
                severity: Severity::from_score(adjusted_risk),
                in_degree: row.in_degree,
                out_degree: row.out_degree,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.adjusted_risk
            .partial_cmp(&a.adjusted_risk)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol_id.cmp(&b.symbol_id))
    });
    entries
}
