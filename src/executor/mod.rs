//! Phase executor: runs one group of workers against a shared upstream context.
//!
//! Every worker in a group is spawned as its own tokio task and the handles
//! are awaited together, so a worker that errors, panics or times out only
//! fails itself. Each successfully executed worker is gated, and the forwarded
//! contexts of the workers that passed are merged in declaration order.
//!
//! A sequential step is a group of one.

use crate::errors::{OrchestratorError, WorkerError};
use crate::events::{EventSink, RunEvent};
use crate::gates::GateEvaluator;
use crate::record::WorkerEntry;
use crate::worker::{ContextMap, RunStatus, Worker, WorkerKind, WorkerOutput, WorkerRegistry, WorkerResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};

/// What a group produced once every member resolved.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    /// One entry per worker, in declaration order
    pub entries: Vec<WorkerEntry>,
    /// Forwarded context of the passing workers, later-declared winning
    pub merged_context: ContextMap,
    /// True iff every worker executed and passed its gate
    pub success: bool,
}

/// Dispatches workers and gates their results.
#[derive(Debug, Clone)]
pub struct PhaseExecutor {
    registry: WorkerRegistry,
    evaluator: GateEvaluator,
    worker_timeout: Option<Duration>,
    events: EventSink,
}

impl PhaseExecutor {
    pub fn new(registry: WorkerRegistry, evaluator: GateEvaluator) -> Self {
        Self {
            registry,
            evaluator,
            worker_timeout: None,
            events: EventSink::default(),
        }
    }

    /// Bound each worker's execution time.
    pub fn with_worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub(crate) fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Run a single sequential step.
    pub async fn run_step(
        &self,
        phase: &str,
        kind: &WorkerKind,
        context: Arc<ContextMap>,
    ) -> Result<GroupOutcome, OrchestratorError> {
        self.run_group(phase, std::slice::from_ref(kind), context).await
    }

    /// Run a group of workers concurrently against the same context.
    ///
    /// Returns `Err` only for configuration problems (a kind with no worker or
    /// no gate), which are detected before anything is dispatched.
    pub async fn run_group(
        &self,
        phase: &str,
        kinds: &[WorkerKind],
        context: Arc<ContextMap>,
    ) -> Result<GroupOutcome, OrchestratorError> {
        let mut workers = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let worker = self
                .registry
                .get(kind)
                .ok_or_else(|| OrchestratorError::UnknownWorker {
                    kind: kind.to_string(),
                })?;
            if !self.evaluator.covers(kind) {
                return Err(OrchestratorError::MissingGate {
                    kind: kind.to_string(),
                });
            }
            workers.push((kind.clone(), worker));
        }

        tracing::debug!(
            phase,
            workers = kinds.len(),
            context_keys = context.len(),
            "Dispatching worker group"
        );

        for kind in kinds {
            self.events
                .emit(RunEvent::WorkerStarted {
                    phase: phase.to_string(),
                    worker: kind.clone(),
                })
                .await;
        }

        let dispatched = Instant::now();
        let handles: Vec<JoinHandle<(Result<WorkerOutput, WorkerError>, Duration)>> = workers
            .into_iter()
            .map(|(kind, worker)| {
                let context = Arc::clone(&context);
                let timeout = self.worker_timeout;
                tokio::spawn(async move {
                    let started = Instant::now();
                    let result = invoke(worker.as_ref(), &kind, &context, timeout).await;
                    (result, started.elapsed())
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let mut outcome = GroupOutcome {
            entries: Vec::with_capacity(kinds.len()),
            merged_context: ContextMap::new(),
            success: true,
        };

        for (kind, joined) in kinds.iter().zip(joined) {
            let (result, elapsed) = match joined {
                Ok(pair) => pair,
                Err(join_err) => (
                    Err(WorkerError::Panicked {
                        message: panic_message(join_err),
                    }),
                    dispatched.elapsed(),
                ),
            };

            let entry = match result {
                Ok(output) => {
                    let result = WorkerResult::completed(kind.clone(), output, elapsed);
                    self.finished(phase, kind, RunStatus::Completed, elapsed).await;

                    let gate = self.evaluator.evaluate(kind, &result)?;
                    self.events
                        .emit(RunEvent::GateEvaluated {
                            phase: phase.to_string(),
                            outcome: Box::new(gate.clone()),
                        })
                        .await;

                    if gate.passed {
                        for (key, value) in &result.forwarded {
                            outcome.merged_context.insert(key.clone(), value.clone());
                        }
                    } else {
                        outcome.success = false;
                    }
                    WorkerEntry::completed(result, gate)
                }
                Err(err) => {
                    tracing::warn!(
                        phase,
                        worker = %kind,
                        error = %err,
                        "Worker failed to execute"
                    );
                    self.finished(phase, kind, RunStatus::Failed, elapsed).await;
                    outcome.success = false;
                    WorkerEntry::failed(kind.clone(), &err.to_string(), elapsed)
                }
            };

            outcome.entries.push(entry);
        }

        Ok(outcome)
    }

    async fn finished(&self, phase: &str, kind: &WorkerKind, status: RunStatus, elapsed: Duration) {
        self.events
            .emit(RunEvent::WorkerFinished {
                phase: phase.to_string(),
                worker: kind.clone(),
                status,
                elapsed_ms: elapsed.as_millis() as u64,
            })
            .await;
    }
}

async fn invoke(
    worker: &dyn Worker,
    kind: &WorkerKind,
    context: &ContextMap,
    timeout: Option<Duration>,
) -> Result<WorkerOutput, WorkerError> {
    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, worker.execute(kind, context))
            .await
            .unwrap_or(Err(WorkerError::TimedOut { limit })),
        None => worker.execute(kind, context).await,
    }?;

    // NaN and infinities have no JSON form and would make the record unreadable.
    if !output.quality_score.is_finite() {
        return Err(WorkerError::failed(format!(
            "quality score {} is not a finite number",
            output.quality_score
        )));
    }
    Ok(output)
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
