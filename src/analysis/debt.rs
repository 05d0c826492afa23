//! Hotspot-weighted technical-debt scoring per file.
//!
//! A file's structural health penalty is amplified by how often the
//! file actually changes: a tangled module nobody touches costs less
//! than a mildly tangled one edited weekly. Remediation minutes run in
//! parallel as a SQALE-style time currency.

use std::cmp::Ordering;

const COMPLEXITY_WEIGHT: f64 = 0.4;
const CYCLE_WEIGHT: f64 = 0.3;
const GOD_WEIGHT: f64 = 0.2;
const DEAD_WEIGHT: f64 = 0.1;

/// Combined in+out degree across a file's symbols above which the file
/// counts as a god component.
const GOD_DEGREE_THRESHOLD: i64 = 40;

const MINUTES_PER_COMPLEXITY_UNIT: f64 = 30.0;
const MINUTES_PER_CYCLE: f64 = 120.0;
const MINUTES_PER_GOD: f64 = 240.0;
const MINUTES_PER_DEAD_EXPORT: f64 = 10.0;

/// Raw per-file inputs assembled by the engine.
#[derive(Debug, Clone, Default)]
pub struct FileDebtInput {
    pub file_id: i64,
    pub path: String,
    pub complexity: f64,
    /// Total added+removed lines across tracked history.
    pub churn: i64,
    pub in_cycle: bool,
    /// Sum of in+out degree over the file's symbols.
    pub total_degree: i64,
    pub dead_exports: usize,
    pub total_exports: usize,
}

/// Scored file, ranked descending in the report.
#[derive(Debug, Clone)]
pub struct FileDebt {
    pub file_id: i64,
    pub path: String,
    pub complexity_norm: f64,
    pub churn_percentile: f64,
    pub in_cycle: bool,
    pub is_god: bool,
    pub dead_ratio: f64,
    pub health_penalty: f64,
    pub hotspot_factor: f64,
    pub debt_score: f64,
    pub remediation_minutes: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DebtSummary {
    pub file_count: usize,
    pub total_debt: f64,
    pub mean_debt: f64,
    pub median_debt: f64,
    /// Debt held by the worst quartile of files and its share of total.
    pub worst_quartile_debt: f64,
    pub worst_quartile_files: usize,
    pub worst_quartile_share: f64,
    pub total_remediation_minutes: f64,
    pub cycle_files: usize,
    pub god_files: usize,
    pub hotspot_files: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DebtReport {
    pub files: Vec<FileDebt>,
    pub summary: DebtSummary,
}

/// Fraction of files with strictly lower churn.
fn churn_percentile(churn: i64, all: &[i64]) -> f64 {
    if all.len() <= 1 {
        return 0.0;
    }
    let lower = all.iter().filter(|&&c| c < churn).count();
    lower as f64 / all.len() as f64
}

/// Score every file and build summary statistics.
pub fn score_debt(inputs: &[FileDebtInput]) -> DebtReport {
    let max_complexity = inputs
        .iter()
        .map(|i| i.complexity)
        .fold(0.0f64, f64::max);
    let churns: Vec<i64> = inputs.iter().map(|i| i.churn).collect();

    let mut files: Vec<FileDebt> = inputs
        .iter()
        .map(|input| {
            let complexity_norm = if max_complexity > 0.0 {
                input.complexity / max_complexity
            } else {
                0.0
            };
            let is_god = input.total_degree > GOD_DEGREE_THRESHOLD;
            let dead_ratio = if input.total_exports > 0 {
                input.dead_exports as f64 / input.total_exports as f64
            } else {
                0.0
            };
            let health_penalty = COMPLEXITY_WEIGHT * complexity_norm
                + CYCLE_WEIGHT * if input.in_cycle { 1.0 } else { 0.0 }
                + GOD_WEIGHT * if is_god { 1.0 } else { 0.0 }
                + DEAD_WEIGHT * dead_ratio;
            let churn_pct = churn_percentile(input.churn, &churns);
            let hotspot_factor = (3.0 * churn_pct).max(1.0);

            let remediation_minutes = MINUTES_PER_COMPLEXITY_UNIT * complexity_norm
                + if input.in_cycle { MINUTES_PER_CYCLE } else { 0.0 }
                + if is_god { MINUTES_PER_GOD } else { 0.0 }
                + MINUTES_PER_DEAD_EXPORT * input.dead_exports as f64;

            FileDebt {
                file_id: input.file_id,
                path: input.path.clone(),
                complexity_norm,
                churn_percentile: churn_pct,
                in_cycle: input.in_cycle,
                is_god,
                dead_ratio,
                health_penalty,
                hotspot_factor,
                debt_score: health_penalty * hotspot_factor,
                remediation_minutes,
            }
        })
        .collect();

    files.sort_by(|a, b| {
        b.debt_score
            .partial_cmp(&a.debt_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });

    let summary = summarize(&files);
    DebtReport { files, summary }
}

fn summarize(files: &[FileDebt]) -> DebtSummary {
    let n = files.len();
    if n == 0 {
        return DebtSummary::default();
    }
    let total_debt: f64 = files.iter().map(|f| f.debt_score).sum();
    let median_debt = files[n / 2].debt_score;

    let quartile = (n / 4).max(1);
    let worst_quartile_debt: f64 = files[..quartile].iter().map(|f| f.debt_score).sum();

    DebtSummary {
        file_count: n,
        total_debt,
        mean_debt: total_debt / n as f64,
        median_debt,
        worst_quartile_debt,
        worst_quartile_files: quartile,
        worst_quartile_share: if total_debt > 0.0 {
            worst_quartile_debt / total_debt
        } else {
            0.0
        },
        total_remediation_minutes: files.iter().map(|f| f.remediation_minutes).sum(),
        cycle_files: files.iter().filter(|f| f.in_cycle).count(),
        god_files: files.iter().filter(|f| f.is_god).count(),
        hotspot_files: files.iter().filter(|f| f.hotspot_factor > 1.0).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(path: &str, complexity: f64, churn: i64) -> FileDebtInput {
        FileDebtInput {
            file_id: 0,
            path: path.to_string(),
            complexity,
            churn,
            in_cycle: false,
            total_degree: 0,
            dead_exports: 0,
            total_exports: 0,
        }
    }

    #[test]
    fn test_churn_amplifies_identical_health() {
        let report = score_debt(&[
            input("hot.py", 5.0, 1000),
            input("cold.py", 5.0, 0),
            input("mid.py", 5.0, 10),
        ]);
        let by_path = |p: &str| report.files.iter().find(|f| f.path == p).unwrap();
        assert!(by_path("hot.py").debt_score >= by_path("cold.py").debt_score);
        assert_eq!(report.files[0].path, "hot.py");
    }

    #[test]
    fn test_hotspot_factor_bounds() {
        let inputs: Vec<FileDebtInput> = (0..50)
            .map(|i| input(&format!("f{i}.py"), 1.0, i as i64))
            .collect();
        let report = score_debt(&inputs);
        for file in &report.files {
            assert!(file.hotspot_factor >= 1.0);
            assert!(file.hotspot_factor <= 3.0);
        }
        // The churn leader hits close to the cap.
        let max = report
            .files
            .iter()
            .map(|f| f.hotspot_factor)
            .fold(0.0f64, f64::max);
        assert!(max > 2.9);
    }

    #[test]
    fn test_health_penalty_weights() {
        let mut cyclic = input("c.py", 0.0, 0);
        cyclic.in_cycle = true;
        let mut god = input("g.py", 0.0, 0);
        god.total_degree = 41;
        let mut dead = input("d.py", 0.0, 0);
        dead.dead_exports = 1;
        dead.total_exports = 2;

        let report = score_debt(&[cyclic, god, dead]);
        let by_path = |p: &str| report.files.iter().find(|f| f.path == p).unwrap();
        assert!((by_path("c.py").health_penalty - 0.3).abs() < 1e-9);
        assert!((by_path("g.py").health_penalty - 0.2).abs() < 1e-9);
        assert!((by_path("d.py").health_penalty - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_god_threshold_is_strict() {
        let mut at = input("at.py", 0.0, 0);
        at.total_degree = 40;
        let mut over = input("over.py", 0.0, 0);
        over.total_degree = 41;
        let report = score_debt(&[at, over]);
        let by_path = |p: &str| report.files.iter().find(|f| f.path == p).unwrap();
        assert!(!by_path("at.py").is_god);
        assert!(by_path("over.py").is_god);
    }

    #[test]
    fn test_remediation_minutes() {
        let mut worst = input("w.py", 10.0, 0);
        worst.in_cycle = true;
        worst.total_degree = 50;
        worst.dead_exports = 3;
        worst.total_exports = 3;
        let report = score_debt(&[worst, input("ok.py", 0.0, 0)]);
        let file = report.files.iter().find(|f| f.path == "w.py").unwrap();
        // 30 (norm 1.0) + 120 + 240 + 30 dead.
        assert!((file.remediation_minutes - 420.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_quartile() {
        let inputs: Vec<FileDebtInput> = (0..8)
            .map(|i| input(&format!("f{i}.py"), i as f64, i as i64 * 10))
            .collect();
        let report = score_debt(&inputs);
        assert_eq!(report.summary.file_count, 8);
        assert_eq!(report.summary.worst_quartile_files, 2);
        assert!(report.summary.worst_quartile_share > 0.25);
        assert!(report.summary.total_debt > 0.0);
        assert_eq!(report.summary.median_debt, report.files[4].debt_score);
    }

    #[test]
    fn test_summary_quartile_rounds_down_with_floor_of_one() {
        let inputs: Vec<FileDebtInput> = (0..5)
            .map(|i| input(&format!("f{i}.py"), i as f64 + 1.0, i as i64 * 10))
            .collect();
        let report = score_debt(&inputs);
        assert_eq!(report.summary.worst_quartile_files, 1);
        assert_eq!(report.summary.median_debt, report.files[2].debt_score);

        let tiny = score_debt(&[input("only.py", 1.0, 0)]);
        assert_eq!(tiny.summary.worst_quartile_files, 1);
    }

    #[test]
    fn test_empty_input() {
        let report = score_debt(&[]);
        assert!(report.files.is_empty());
        assert_eq!(report.summary.file_count, 0);
    }
}
