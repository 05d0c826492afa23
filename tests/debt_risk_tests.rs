//! End-to-end debt scoring and risk ranking: history ingestion feeding
//! hotspot amplification, and domain weights applied through the
//! engine.

mod common;

use common::{registry, write_demo_project, write_file};
use meridian::analysis::{RiskConfig, Severity};
use meridian::history::{CommitRecord, FileChange};
use meridian::{Engine, EngineConfig};
use tempfile::TempDir;

fn commit(hash: &str, changes: &[(&str, i64, i64)]) -> CommitRecord {
    CommitRecord {
        hash: hash.to_string(),
        author: Some("dev".to_string()),
        timestamp: 1_700_000_000,
        message: None,
        changes: changes
            .iter()
            .map(|&(path, added, removed)| FileChange {
                path: path.to_string(),
                lines_added: added,
                lines_removed: removed,
            })
            .collect(),
    }
}

#[test]
fn test_history_ingestion_counts() {
    let temp = TempDir::new().unwrap();
    write_demo_project(temp.path());
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let commits = vec![
        commit("c1", &[("utils.py", 10, 2), ("models.py", 1, 0)]),
        commit("c2", &[("utils.py", 10, 2), ("models.py", 1, 0)]),
        commit("c3", &[("utils.py", 10, 2), ("models.py", 1, 0)]),
    ];
    let summary = engine.ingest_commits(&commits).unwrap();
    assert_eq!(summary.commits, 3);
    assert_eq!(summary.file_changes, 6);
    assert_eq!(summary.cochange_pairs, 1);

    let top = engine.store().top_churn_files(1).unwrap();
    assert_eq!(top[0].0, "utils.py");
    assert_eq!(top[0].1.total_churn, 36);
    assert_eq!(top[0].1.commit_count, 3);
}

#[test]
fn test_churn_amplifies_debt() {
    let temp = TempDir::new().unwrap();
    write_demo_project(temp.path());
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let commits = vec![
        commit("c1", &[("utils.py", 10, 2), ("models.py", 1, 0)]),
        commit("c2", &[("utils.py", 10, 2), ("models.py", 1, 0)]),
        commit("c3", &[("utils.py", 10, 2), ("models.py", 1, 0)]),
    ];
    engine.ingest_commits(&commits).unwrap();

    let report = engine.debt().unwrap();
    assert_eq!(report.summary.file_count, 4);

    let find = |path: &str| report.files.iter().find(|f| f.path == path).unwrap();
    // 3 of 4 files have strictly lower churn than utils.py.
    let utils = find("utils.py");
    assert!((utils.hotspot_factor - 2.25).abs() < 1e-9);
    assert!((utils.churn_percentile - 0.75).abs() < 1e-9);
    // Untouched files never get amplified.
    assert!((find("main.py").hotspot_factor - 1.0).abs() < 1e-9);

    // utils.py carries the only high-confidence dead export and the
    // most churn; it ends up the worst file.
    assert_eq!(report.files[0].path, "utils.py");
    assert!(report.files[0].debt_score > 0.0);
    assert_eq!(report.summary.hotspot_files, 2);
}

#[test]
fn test_hotspot_factor_stays_in_bounds() {
    let temp = TempDir::new().unwrap();
    write_demo_project(temp.path());
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let commits: Vec<CommitRecord> = (0..20)
        .map(|i| commit(&format!("c{i}"), &[("utils.py", 100, 50), ("main.py", 1, 1)]))
        .collect();
    engine.ingest_commits(&commits).unwrap();

    for file in engine.debt().unwrap().files {
        assert!(file.hotspot_factor >= 1.0, "{}", file.path);
        assert!(file.hotspot_factor <= 3.0, "{}", file.path);
    }
}

#[test]
fn test_cycles_raise_penalty_and_remediation() {
    let temp = TempDir::new().unwrap();
    write_file(
        temp.path(),
        "tangle.py",
        "def ping\ndef pong\ncall ping pong\ncall pong ping\n",
    );
    write_file(temp.path(), "clean.py", "def tidy\ncall tidy ping\n");
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let report = engine.debt().unwrap();
    let tangle = report.files.iter().find(|f| f.path == "tangle.py").unwrap();
    assert!(tangle.in_cycle);
    assert!(tangle.health_penalty >= 0.3);
    assert!(tangle.remediation_minutes >= 120.0);

    let clean = report.files.iter().find(|f| f.path == "clean.py").unwrap();
    assert!(!clean.in_cycle);
    assert!(tangle.debt_score > clean.debt_score);
    assert_eq!(report.summary.cycle_files, 1);
}

#[test]
fn test_domain_weights_rank_financial_code_first() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "pay.py", "def process_payment\n");
    write_file(
        temp.path(),
        "app.py",
        "def render_tooltip\ncall render_tooltip process_payment\n",
    );
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let entries = engine.risk(&RiskConfig::default()).unwrap();
    assert_eq!(entries.len(), 2);

    let top = &entries[0];
    assert_eq!(top.name, "process_payment");
    assert_eq!(top.domain_match, "payment");
    assert!((top.domain_weight - 10.0).abs() < 1e-9);
    assert!((top.static_risk - 5.0).abs() < 1e-9);
    assert!((top.adjusted_risk - 50.0).abs() < 1e-9);
    assert_eq!(top.severity, Severity::Critical);

    // UI vocabulary dampens instead.
    let ui = &entries[1];
    assert_eq!(ui.name, "render_tooltip");
    assert!((ui.domain_weight - 0.3).abs() < 1e-9);
    assert_eq!(ui.severity, Severity::Low);
}

#[test]
fn test_ui_path_halves_strong_domain_weights() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "components/form.py", "def charge_payment\n");
    write_file(temp.path(), "app.py", "def submit\ncall submit charge_payment\n");
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let entries = engine.risk(&RiskConfig::default()).unwrap();
    let charge = entries.iter().find(|e| e.name == "charge_payment").unwrap();
    assert!((charge.domain_weight - 5.0).abs() < 1e-9);
    assert_eq!(charge.file_path, "components/form.py");
}

#[test]
fn test_custom_weights_override_defaults() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "pay.py", "def process_payment\n");
    write_file(temp.path(), "app.py", "def submit\ncall submit process_payment\n");
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let config = RiskConfig {
        custom_weights: [("payment".to_string(), 1.0)].into_iter().collect(),
    };
    let entries = engine.risk(&config).unwrap();
    let payment = entries.iter().find(|e| e.name == "process_payment").unwrap();
    // "payment" neutralized; "process" (3.0) becomes the best match.
    assert!((payment.domain_weight - 3.0).abs() < 1e-9);
    assert_eq!(payment.domain_match, "process");
}

#[test]
fn test_risk_skips_symbols_without_edges() {
    let temp = TempDir::new().unwrap();
    write_demo_project(temp.path());
    let registry = registry();
    let engine = Engine::open(EngineConfig::new(temp.path()), &registry).unwrap();
    engine.reindex(false).unwrap();

    let entries = engine.risk(&RiskConfig::default()).unwrap();
    assert!(entries.iter().all(|e| e.name != "unused_helper"));
    assert!(entries.iter().all(|e| e.in_degree + e.out_degree > 0));
}
