//! Run records produced by the orchestrator.
//!
//! A [`RunRecord`] captures one invocation: the topology used, timestamps,
//! every worker's status, result and gate outcome, and the overall verdict.
//! Sequential runs keep a flat worker list; parallel runs nest workers under
//! their phase. Records are plain serde data so they round-trip through JSON
//! and can be fed back into the feedback analyzer later.

use crate::gates::GateOutcome;
use crate::util::duration_serde;
use crate::worker::{RunStatus, WorkerKind, WorkerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Phase label used for the entries of a sequential run.
pub const SEQUENTIAL_PHASE: &str = "sequential";

/// Which execution topology produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One worker at a time in a fixed order
    Sequential,
    /// Concurrent groups of workers in fixed phases
    Parallel,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Sequential => write!(f, "sequential"),
            Topology::Parallel => write!(f, "parallel"),
        }
    }
}

impl std::str::FromStr for Topology {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Ok(Topology::Sequential),
            "parallel" | "par" => Ok(Topology::Parallel),
            _ => anyhow::bail!(
                "Invalid topology '{}'. Valid values: sequential, parallel",
                s
            ),
        }
    }
}

/// Outcome of a whole phase in a parallel run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Every worker executed and passed its gate
    Completed,
    /// At least one worker failed to execute or missed its gate
    Failed,
    /// Never dispatched because an earlier phase failed
    Skipped,
}

/// Everything recorded about one worker in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerEntry {
    /// Worker kind
    pub kind: WorkerKind,
    /// Terminal status
    pub status: RunStatus,
    /// Time spent executing (zero when never dispatched)
    #[serde(with = "duration_serde", rename = "elapsed_ms")]
    pub elapsed: Duration,
    /// Result, present when the worker executed successfully
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<WorkerResult>,
    /// Gate outcome, present when a result was gated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateOutcome>,
    /// Execution error, present when the worker failed to execute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerEntry {
    /// A worker that executed and was gated.
    pub fn completed(result: WorkerResult, gate: GateOutcome) -> Self {
        Self {
            kind: result.kind.clone(),
            status: result.status,
            elapsed: result.elapsed,
            result: Some(result),
            gate: Some(gate),
            error: None,
        }
    }

    /// A worker that failed to execute.
    pub fn failed(kind: WorkerKind, error: &str, elapsed: Duration) -> Self {
        Self {
            kind,
            status: RunStatus::Failed,
            elapsed,
            result: None,
            gate: None,
            error: Some(error.to_string()),
        }
    }

    /// A worker that was never dispatched.
    pub fn blocked(kind: WorkerKind) -> Self {
        Self {
            kind,
            status: RunStatus::Blocked,
            elapsed: Duration::ZERO,
            result: None,
            gate: None,
            error: None,
        }
    }

    /// Whether the worker executed and passed its gate.
    pub fn gate_passed(&self) -> bool {
        self.gate.as_ref().is_some_and(|g| g.passed)
    }
}

/// One phase of a parallel run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Phase name (`independent`, `coordinated`, `integration`, ...)
    pub name: String,
    /// Phase outcome
    pub status: PhaseStatus,
    /// Workers in declaration order
    pub workers: Vec<WorkerEntry>,
}

impl PhaseRecord {
    /// A phase that never ran; every worker is recorded as blocked.
    pub fn skipped(name: &str, kinds: &[WorkerKind]) -> Self {
        Self {
            name: name.to_string(),
            status: PhaseStatus::Skipped,
            workers: kinds.iter().cloned().map(WorkerEntry::blocked).collect(),
        }
    }
}

/// Worker entries grouped according to the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum RunStages {
    /// Sequential runs: one ordered list
    Flat { workers: Vec<WorkerEntry> },
    /// Parallel runs: ordered phases
    Phased { phases: Vec<PhaseRecord> },
}

/// Full record of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Topology used
    pub topology: Topology,
    /// Whether compliance was enforced by the gates
    pub compliance_required: bool,
    /// Start of the run
    pub started_at: DateTime<Utc>,
    /// End of the run
    pub finished_at: DateTime<Utc>,
    /// Total wall-clock time
    #[serde(with = "duration_serde", rename = "duration_ms")]
    pub duration: Duration,
    /// True iff every evaluated gate passed and no worker failed to execute
    pub overall_success: bool,
    /// Per-worker breakdown
    pub stages: RunStages,
}

impl RunRecord {
    /// Every worker entry with the name of the phase it belongs to.
    pub fn entries(&self) -> Vec<(&str, &WorkerEntry)> {
        match &self.stages {
            RunStages::Flat { workers } => workers.iter().map(|w| (SEQUENTIAL_PHASE, w)).collect(),
            RunStages::Phased { phases } => phases
                .iter()
                .flat_map(|p| p.workers.iter().map(move |w| (p.name.as_str(), w)))
                .collect(),
        }
    }

    /// Look up the entry for a worker kind.
    pub fn entry(&self, kind: &WorkerKind) -> Option<&WorkerEntry> {
        self.entries()
            .into_iter()
            .map(|(_, entry)| entry)
            .find(|entry| &entry.kind == kind)
    }

    /// Look up a phase by name (parallel runs only).
    pub fn phase(&self, name: &str) -> Option<&PhaseRecord> {
        match &self.stages {
            RunStages::Flat { .. } => None,
            RunStages::Phased { phases } => phases.iter().find(|p| p.name == name),
        }
    }

    /// Count workers by outcome.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for (_, entry) in self.entries() {
            summary.total_workers += 1;
            match entry.status {
                RunStatus::Completed => summary.completed += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::Blocked => summary.blocked += 1,
                RunStatus::Pending | RunStatus::InProgress => {}
            }
            if let Some(gate) = &entry.gate {
                if gate.passed {
                    summary.gates_passed += 1;
                } else {
                    summary.gates_failed += 1;
                }
            }
        }
        summary
    }
}

/// Worker counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_workers: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub gates_passed: usize,
    pub gates_failed: usize,
}

impl RunSummary {
    /// Percentage of workers that passed their gate.
    pub fn pass_percentage(&self) -> f64 {
        if self.total_workers == 0 {
            return 100.0;
        }
        (self.gates_passed as f64 / self.total_workers as f64) * 100.0
    }
}

/// Accumulates a record while a run is in flight.
///
/// Only the orchestrator's coordinating task holds the recorder, and only
/// after a step or phase has fully resolved.
pub(crate) struct RunRecorder {
    run_id: Uuid,
    topology: Topology,
    compliance_required: bool,
    started_at: DateTime<Utc>,
    timer: Instant,
    overall_success: bool,
    workers: Vec<WorkerEntry>,
    phases: Vec<PhaseRecord>,
}

impl RunRecorder {
    pub(crate) fn start(topology: Topology, compliance_required: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topology,
            compliance_required,
            started_at: Utc::now(),
            timer: Instant::now(),
            overall_success: true,
            workers: Vec::new(),
            phases: Vec::new(),
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn topology(&self) -> Topology {
        self.topology
    }

    pub(crate) fn push_worker(&mut self, entry: WorkerEntry) {
        if !entry.gate_passed() {
            self.overall_success = false;
        }
        self.workers.push(entry);
    }

    pub(crate) fn push_phase(&mut self, phase: PhaseRecord) {
        if phase.status != PhaseStatus::Completed {
            self.overall_success = false;
        }
        self.phases.push(phase);
    }

    pub(crate) fn overall_success(&self) -> bool {
        self.overall_success
    }

    pub(crate) fn finish(self) -> RunRecord {
        let stages = match self.topology {
            Topology::Sequential => RunStages::Flat {
                workers: self.workers,
            },
            Topology::Parallel => RunStages::Phased {
                phases: self.phases,
            },
        };

        RunRecord {
            run_id: self.run_id,
            topology: self.topology,
            compliance_required: self.compliance_required,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration: self.timer.elapsed(),
            overall_success: self.overall_success,
            stages,
        }
    }
}
