//! Post-run feedback analysis.
//!
//! [`analyze`] inspects a finished [`RunRecord`] and reports what went wrong
//! and how each worker performed. It never reads the clock or any other
//! ambient state, so analyzing the same record twice yields equal reports.
//! [`render_report`] turns a report into a terminal table.

use crate::record::{RunRecord, Topology};
use crate::worker::{RunStatus, WorkerKind};
use console::style;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use uuid::Uuid;

/// Suggestion templates used when none are configured.
pub const DEFAULT_SUGGESTIONS: [&str; 5] = [
    "Implement continuous medical content validation",
    "Add real-time performance monitoring during agent execution",
    "Enhance cross-agent dependency management",
    "Improve medical domain expertise integration",
    "Optimize parallel processing for better resource utilization",
];

/// Analyzer settings.
///
/// Suggestions are templates; `{topology}`, `{failed_gates}`,
/// `{failed_workers}` and `{mean_score}` are substituted from the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<String>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            suggestions: default_suggestions(),
        }
    }
}

fn default_suggestions() -> Vec<String> {
    DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// Overall verdict of the analyzed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Successful,
    NeedsImprovement,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Successful => write!(f, "successful"),
            WorkflowStatus::NeedsImprovement => write!(f, "needs_improvement"),
        }
    }
}

/// A gate that did not pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedGate {
    pub phase: String,
    pub kind: WorkerKind,
    pub gate_name: String,
    /// `score`, `compliance` and/or `criteria`
    pub failed_checks: Vec<String>,
    pub failed_criteria: Vec<String>,
    pub detail: String,
}

/// A worker that failed to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedWorker {
    pub phase: String,
    pub kind: WorkerKind,
    pub error: String,
}

/// A worker that was never dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedWorker {
    pub phase: String,
    pub kind: WorkerKind,
}

/// Performance of one executed worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub phase: String,
    pub kind: WorkerKind,
    pub quality_score: f64,
    pub elapsed_ms: u64,
    pub medical_compliance: bool,
    pub recommendations_count: usize,
    pub gate_passed: bool,
}

/// Run-wide numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Workers that produced a result
    pub executed: usize,
    /// Workers whose gate passed
    pub gates_passed: usize,
    /// Mean quality score over executed workers (0 when none executed)
    pub mean_score: f64,
    pub total_elapsed_ms: u64,
}

/// Everything [`analyze`] derives from a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReport {
    pub run_id: Uuid,
    pub topology: Topology,
    pub status: WorkflowStatus,
    pub failed_gates: Vec<FailedGate>,
    pub failed_workers: Vec<FailedWorker>,
    pub blocked_workers: Vec<BlockedWorker>,
    pub worker_stats: Vec<WorkerStats>,
    pub aggregate: AggregateStats,
    pub suggestions: Vec<String>,
}

/// Analyze a finished run.
pub fn analyze(record: &RunRecord, config: &FeedbackConfig) -> FeedbackReport {
    let status = if record.overall_success {
        WorkflowStatus::Successful
    } else {
        WorkflowStatus::NeedsImprovement
    };

    let mut failed_gates = Vec::new();
    let mut failed_workers = Vec::new();
    let mut blocked_workers = Vec::new();
    let mut worker_stats = Vec::new();
    let mut aggregate = AggregateStats::default();
    let mut score_total = 0.0;

    for (phase, entry) in record.entries() {
        if let Some(gate) = entry.gate.as_ref().filter(|g| !g.passed) {
            failed_gates.push(FailedGate {
                phase: phase.to_string(),
                kind: entry.kind.clone(),
                gate_name: gate.gate_name.clone(),
                failed_checks: gate.failed_checks().iter().map(|c| c.to_string()).collect(),
                failed_criteria: gate.failed_criteria.clone(),
                detail: gate.detail.clone(),
            });
        }

        match entry.status {
            RunStatus::Failed => failed_workers.push(FailedWorker {
                phase: phase.to_string(),
                kind: entry.kind.clone(),
                error: entry.error.clone().unwrap_or_default(),
            }),
            RunStatus::Blocked => blocked_workers.push(BlockedWorker {
                phase: phase.to_string(),
                kind: entry.kind.clone(),
            }),
            _ => {}
        }

        if let Some(result) = &entry.result {
            let elapsed_ms = result.elapsed.as_millis() as u64;
            aggregate.executed += 1;
            aggregate.total_elapsed_ms += elapsed_ms;
            if entry.gate_passed() {
                aggregate.gates_passed += 1;
            }
            score_total += result.quality_score;

            worker_stats.push(WorkerStats {
                phase: phase.to_string(),
                kind: entry.kind.clone(),
                quality_score: result.quality_score,
                elapsed_ms,
                medical_compliance: result.medical_compliance,
                recommendations_count: result.recommendations.len(),
                gate_passed: entry.gate_passed(),
            });
        }
    }

    if aggregate.executed > 0 {
        aggregate.mean_score = score_total / aggregate.executed as f64;
    }

    let suggestions = config
        .suggestions
        .iter()
        .map(|template| {
            template
                .replace("{topology}", &record.topology.to_string())
                .replace("{failed_gates}", &failed_gates.len().to_string())
                .replace("{failed_workers}", &failed_workers.len().to_string())
                .replace("{mean_score}", &format!("{:.1}", aggregate.mean_score))
        })
        .collect();

    FeedbackReport {
        run_id: record.run_id,
        topology: record.topology,
        status,
        failed_gates,
        failed_workers,
        blocked_workers,
        worker_stats,
        aggregate,
        suggestions,
    }
}

/// Render a report as a plain-text table.
pub fn render_report(report: &FeedbackReport) -> String {
    let mut out = String::new();

    let status = match report.status {
        WorkflowStatus::Successful => style(report.status.to_string()).green().bold(),
        WorkflowStatus::NeedsImprovement => style(report.status.to_string()).yellow().bold(),
    };

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Run {} ({}): {}",
        report.run_id, report.topology, status
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<14} {:<14} {:<8} {:<10} {:<6} {:<6} {:<6}",
        "Phase", "Worker", "Score", "Elapsed", "Comp", "Recs", "Gate"
    );
    let _ = writeln!(
        out,
        "{:<14} {:<14} {:<8} {:<10} {:<6} {:<6} {:<6}",
        "--------------", "--------------", "--------", "----------", "------", "------", "------"
    );

    for stat in &report.worker_stats {
        let _ = writeln!(
            out,
            "{:<14} {:<14} {:<8.1} {:<10} {:<6} {:<6} {:<6}",
            stat.phase,
            stat.kind.as_str(),
            stat.quality_score,
            format!("{}ms", stat.elapsed_ms),
            if stat.medical_compliance { "yes" } else { "no" },
            stat.recommendations_count,
            if stat.gate_passed { "pass" } else { "FAIL" }
        );
    }
    for failed in &report.failed_workers {
        let _ = writeln!(
            out,
            "{:<14} {:<14} {}",
            failed.phase,
            failed.kind.as_str(),
            style(format!("failed: {}", failed.error)).red()
        );
    }
    for blocked in &report.blocked_workers {
        let _ = writeln!(
            out,
            "{:<14} {:<14} {}",
            blocked.phase,
            blocked.kind.as_str(),
            style("blocked").dim()
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Executed: {}  Gates passed: {}  Mean score: {:.1}  Total time: {}ms",
        report.aggregate.executed,
        report.aggregate.gates_passed,
        report.aggregate.mean_score,
        report.aggregate.total_elapsed_ms
    );

    if !report.failed_gates.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("Failed gates:").red().bold());
        for gate in &report.failed_gates {
            let _ = writeln!(
                out,
                "  {} in {} phase ({}): {}",
                gate.kind.display_name(),
                gate.phase,
                gate.failed_checks.join(", "),
                gate.detail
            );
        }
    }

    if !report.suggestions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("Suggestions:").cyan().bold());
        for suggestion in &report.suggestions {
            let _ = writeln!(out, "  - {}", suggestion);
        }
    }

    out
}
