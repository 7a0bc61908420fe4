//! Workflow orchestrator.
//!
//! Drives a configured pipeline in one of two topologies:
//!
//! - **sequential**: one worker at a time; each worker receives the forwarded
//!   context of the worker before it. The first gate or execution failure
//!   halts the run and every remaining worker is recorded as `blocked`.
//! - **parallel**: ordered phases of concurrent workers; each phase receives the
//!   merged forwarded context of the phase before it. A failed phase lets its
//!   dispatched siblings finish, then every later phase is recorded as
//!   `skipped`.
//!
//! The layout is validated before anything is dispatched, so configuration
//! mistakes surface as an [`OrchestratorError`] instead of a half-run record.

use crate::errors::OrchestratorError;
use crate::events::{EventSink, RunEvent};
use crate::executor::PhaseExecutor;
use crate::gates::{GateEvaluator, GateSet, default_gates};
use crate::record::{PhaseRecord, PhaseStatus, RunRecord, RunRecorder, SEQUENTIAL_PHASE, Topology, WorkerEntry};
use crate::worker::{ContextMap, WorkerKind, WorkerRegistry, default_fixtures, stub_registry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A named group of workers that run concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub name: String,
    pub workers: Vec<WorkerKind>,
}

impl PhaseSpec {
    pub fn new(name: &str, workers: &[WorkerKind]) -> Self {
        Self {
            name: name.to_string(),
            workers: workers.to_vec(),
        }
    }
}

/// Order of workers for both topologies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineLayout {
    /// Worker order for sequential runs
    #[serde(default = "default_sequence")]
    pub sequence: Vec<WorkerKind>,
    /// Phases for parallel runs
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseSpec>,
}

impl Default for PipelineLayout {
    fn default() -> Self {
        Self {
            sequence: default_sequence(),
            phases: default_phases(),
        }
    }
}

impl PipelineLayout {
    /// Every worker kind the given topology would dispatch, in order.
    pub fn workers(&self, topology: Topology) -> Vec<&WorkerKind> {
        match topology {
            Topology::Sequential => self.sequence.iter().collect(),
            Topology::Parallel => self.phases.iter().flat_map(|p| p.workers.iter()).collect(),
        }
    }
}

pub(crate) fn default_sequence() -> Vec<WorkerKind> {
    WorkerKind::BUILTIN.to_vec()
}

pub(crate) fn default_phases() -> Vec<PhaseSpec> {
    vec![
        PhaseSpec::new(
            "independent",
            &[WorkerKind::CodeQuality, WorkerKind::UiUx, WorkerKind::Performance],
        ),
        PhaseSpec::new(
            "coordinated",
            &[WorkerKind::Testing, WorkerKind::Security, WorkerKind::Devops],
        ),
        PhaseSpec::new("integration", &[WorkerKind::Architecture]),
    ]
}

/// Everything an orchestrator needs; fixed once the orchestrator is built.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub registry: WorkerRegistry,
    pub gates: Arc<GateSet>,
    pub compliance_required: bool,
    pub layout: PipelineLayout,
    pub worker_timeout: Option<Duration>,
}

impl OrchestratorConfig {
    /// Compliance enforced, default layout, no timeout.
    pub fn new(registry: WorkerRegistry, gates: GateSet) -> Self {
        Self {
            registry,
            gates: Arc::new(gates),
            compliance_required: true,
            layout: PipelineLayout::default(),
            worker_timeout: None,
        }
    }

    /// Default stub workers against the default gates.
    pub fn with_stub_workers() -> Self {
        Self::new(stub_registry(default_fixtures()), default_gates())
    }

    pub fn with_compliance(mut self, required: bool) -> Self {
        self.compliance_required = required;
        self
    }

    pub fn with_layout(mut self, layout: PipelineLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout = timeout;
        self
    }
}

/// Runs the pipeline and produces [`RunRecord`]s.
pub struct Orchestrator {
    config: OrchestratorConfig,
    events: EventSink,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            events: EventSink::default(),
        }
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.events = EventSink::new(Some(tx));
        self
    }

    /// Run with the given topology.
    pub async fn run(&self, topology: Topology) -> Result<RunRecord, OrchestratorError> {
        match topology {
            Topology::Sequential => self.run_sequential().await,
            Topology::Parallel => self.run_parallel().await,
        }
    }

    /// Run every worker in the configured order, halting at the first failure.
    pub async fn run_sequential(&self) -> Result<RunRecord, OrchestratorError> {
        self.validate_layout(Topology::Sequential)?;

        let sequence = &self.config.layout.sequence;
        let mut recorder = RunRecorder::start(Topology::Sequential, self.config.compliance_required);
        self.started(&recorder, sequence.len()).await;

        self.events
            .emit(RunEvent::PhaseStarted {
                phase: SEQUENTIAL_PHASE.to_string(),
                workers: sequence.clone(),
            })
            .await;

        let executor = self.executor();
        let mut context = Arc::new(ContextMap::new());

        for (index, kind) in sequence.iter().enumerate() {
            tracing::info!(step = index + 1, worker = %kind, "Running sequential step");

            let outcome = executor
                .run_step(SEQUENTIAL_PHASE, kind, Arc::clone(&context))
                .await?;
            let halted = !outcome.success;

            for entry in outcome.entries {
                recorder.push_worker(entry);
            }

            if halted {
                let remaining = &sequence[index + 1..];
                tracing::warn!(
                    worker = %kind,
                    blocked = remaining.len(),
                    "Sequential run halted"
                );
                for blocked in remaining {
                    recorder.push_worker(WorkerEntry::blocked(blocked.clone()));
                }
                break;
            }

            context = Arc::new(outcome.merged_context);
        }

        let status = if recorder.overall_success() {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Failed
        };
        self.events
            .emit(RunEvent::PhaseCompleted {
                phase: SEQUENTIAL_PHASE.to_string(),
                status,
            })
            .await;

        Ok(self.completed(recorder).await)
    }

    /// Run the configured phases, each phase's workers concurrently.
    pub async fn run_parallel(&self) -> Result<RunRecord, OrchestratorError> {
        self.validate_layout(Topology::Parallel)?;

        let phases = &self.config.layout.phases;
        let mut recorder = RunRecorder::start(Topology::Parallel, self.config.compliance_required);
        self.started(&recorder, self.config.layout.workers(Topology::Parallel).len())
            .await;

        let executor = self.executor();
        let mut context = Arc::new(ContextMap::new());
        let mut halted = false;

        for spec in phases {
            if halted {
                tracing::info!(phase = %spec.name, "Skipping phase after upstream failure");
                recorder.push_phase(PhaseRecord::skipped(&spec.name, &spec.workers));
                self.events
                    .emit(RunEvent::PhaseCompleted {
                        phase: spec.name.clone(),
                        status: PhaseStatus::Skipped,
                    })
                    .await;
                continue;
            }

            tracing::info!(
                phase = %spec.name,
                workers = spec.workers.len(),
                context_keys = context.len(),
                "Starting phase"
            );
            self.events
                .emit(RunEvent::PhaseStarted {
                    phase: spec.name.clone(),
                    workers: spec.workers.clone(),
                })
                .await;

            let outcome = executor
                .run_group(&spec.name, &spec.workers, Arc::clone(&context))
                .await?;

            let status = if outcome.success {
                PhaseStatus::Completed
            } else {
                PhaseStatus::Failed
            };

            recorder.push_phase(PhaseRecord {
                name: spec.name.clone(),
                status,
                workers: outcome.entries,
            });
            self.events
                .emit(RunEvent::PhaseCompleted {
                    phase: spec.name.clone(),
                    status,
                })
                .await;

            if outcome.success {
                context = Arc::new(outcome.merged_context);
            } else {
                tracing::warn!(phase = %spec.name, "Phase failed; later phases will be skipped");
                halted = true;
            }
        }

        Ok(self.completed(recorder).await)
    }

    /// Reject layouts that cannot run before any worker is dispatched.
    fn validate_layout(&self, topology: Topology) -> Result<(), OrchestratorError> {
        let layout = &self.config.layout;
        let kinds = layout.workers(topology);

        if kinds.is_empty() {
            return Err(OrchestratorError::EmptyLayout {
                topology: topology.to_string(),
            });
        }

        if topology == Topology::Parallel
            && let Some(empty) = layout.phases.iter().find(|p| p.workers.is_empty())
        {
            return Err(OrchestratorError::Config(format!(
                "phase '{}' has no workers",
                empty.name
            )));
        }

        let mut seen = HashSet::new();
        for kind in kinds {
            if !kind.is_canonical() {
                return Err(OrchestratorError::InvalidKind {
                    kind: kind.to_string(),
                });
            }
            if !seen.insert(kind) {
                return Err(OrchestratorError::DuplicateWorker {
                    kind: kind.to_string(),
                    topology: topology.to_string(),
                });
            }
            if !self.config.registry.contains(kind) {
                return Err(OrchestratorError::UnknownWorker {
                    kind: kind.to_string(),
                });
            }
            if !self.config.gates.contains(kind) {
                return Err(OrchestratorError::MissingGate {
                    kind: kind.to_string(),
                });
            }
        }

        Ok(())
    }

    fn executor(&self) -> PhaseExecutor {
        let evaluator = GateEvaluator::new(
            Arc::clone(&self.config.gates),
            self.config.compliance_required,
        );
        PhaseExecutor::new(self.config.registry.clone(), evaluator)
            .with_worker_timeout(self.config.worker_timeout)
            .with_events(self.events.clone())
    }

    async fn started(&self, recorder: &RunRecorder, workers: usize) {
        let run_id = recorder.run_id();
        let topology = recorder.topology();
        tracing::info!(
            %run_id,
            %topology,
            workers,
            compliance_required = self.config.compliance_required,
            "Run started"
        );
        self.events
            .emit(RunEvent::RunStarted { run_id, topology })
            .await;
    }

    async fn completed(&self, recorder: RunRecorder) -> RunRecord {
        let record = recorder.finish();
        let summary = record.summary();

        tracing::info!(
            run_id = %record.run_id,
            success = record.overall_success,
            gates_passed = summary.gates_passed,
            pass_percentage = summary.pass_percentage(),
            failed = summary.failed,
            blocked = summary.blocked,
            duration_ms = record.duration.as_millis() as u64,
            "Run completed"
        );

        self.events
            .emit(RunEvent::RunCompleted {
                run_id: record.run_id,
                success: record.overall_success,
                summary,
            })
            .await;

        record
    }
}
