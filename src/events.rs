//! Progress events emitted while a run is in flight.

use crate::gates::GateOutcome;
use crate::record::{PhaseStatus, RunSummary, Topology};
use crate::worker::{RunStatus, WorkerKind};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events emitted during orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run has started.
    RunStarted { run_id: Uuid, topology: Topology },
    /// A phase (or sequential step) is about to dispatch its workers.
    PhaseStarted {
        phase: String,
        workers: Vec<WorkerKind>,
    },
    /// A worker was dispatched.
    WorkerStarted { phase: String, worker: WorkerKind },
    /// A worker finished executing, successfully or not.
    WorkerFinished {
        phase: String,
        worker: WorkerKind,
        status: RunStatus,
        elapsed_ms: u64,
    },
    /// A worker's result was gated.
    GateEvaluated {
        phase: String,
        outcome: Box<GateOutcome>,
    },
    /// A phase resolved.
    PhaseCompleted { phase: String, status: PhaseStatus },
    /// The run finished.
    RunCompleted {
        run_id: Uuid,
        success: bool,
        summary: RunSummary,
    },
}

/// Optional sink for [`RunEvent`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<RunEvent>>,
}

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::Sender<RunEvent>>) -> Self {
        Self { tx }
    }

    /// Send an event if a channel is attached; a dropped receiver is ignored.
    pub(crate) async fn emit(&self, event: RunEvent) {
        if let Some(ref tx) = self.tx {
            tx.send(event).await.ok();
        }
    }
}
