//! Higher-level analyses layered on the graph snapshots: dead-code
//! candidates, technical-debt scoring, and risk ranking.

mod dead;
mod debt;
mod risk;

pub use dead::{
    dead_candidates, dead_clusters, extinction_cascade, CascadeEntry, DeadAction, DeadCandidate,
    DeadTier,
};
pub use debt::{score_debt, DebtReport, DebtSummary, FileDebt, FileDebtInput};
pub use risk::{rank_risk, RiskConfig, RiskEntry, Severity};
