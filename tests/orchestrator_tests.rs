//! Library-level tests for the orchestrator topologies.
//!
//! Workers here are small test doubles registered alongside custom gates, so
//! each scenario controls exactly what every stage returns and observes.

use async_trait::async_trait;
use serde_json::json;
use stagegate::errors::{OrchestratorError, WorkerError};
use stagegate::feedback::{FeedbackConfig, WorkflowStatus, analyze};
use stagegate::gates::{Criterion, GateSet, QualityGate};
use stagegate::orchestrator::{Orchestrator, OrchestratorConfig, PhaseSpec, PipelineLayout};
use stagegate::record::{PhaseStatus, RunRecord, RunStages, Topology};
use stagegate::worker::{
    ContextMap, RunStatus, StubFixture, StubWorker, Worker, WorkerKind, WorkerOutput,
    WorkerRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Returns a fixed output and remembers every context it was handed.
struct Probe {
    output: WorkerOutput,
    calls: AtomicUsize,
    contexts: Mutex<Vec<ContextMap>>,
}

impl Probe {
    fn new(output: WorkerOutput) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_context(&self) -> ContextMap {
        self.contexts.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Worker for Probe {
    async fn execute(
        &self,
        _kind: &WorkerKind,
        context: &ContextMap,
    ) -> Result<WorkerOutput, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());
        Ok(self.output.clone())
    }
}

struct Exploding;

#[async_trait]
impl Worker for Exploding {
    async fn execute(
        &self,
        _kind: &WorkerKind,
        _context: &ContextMap,
    ) -> Result<WorkerOutput, WorkerError> {
        panic!("worker blew up");
    }
}

fn kind(name: &str) -> WorkerKind {
    WorkerKind::Custom(name.to_string())
}

/// Output that satisfies [`gate`].
fn good(score: f64) -> WorkerOutput {
    WorkerOutput::new(score).with_fact("report", json!({"complete": true}))
}

/// Gate with a score threshold and one criterion.
fn gate(name: &str, required: f64) -> QualityGate {
    QualityGate::new(name, required).with_criterion("report.complete", Criterion::Truthy)
}

struct Harness {
    registry: WorkerRegistry,
    gates: GateSet,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: WorkerRegistry::new(),
            gates: GateSet::new(),
        }
    }

    fn worker(mut self, name: &str, worker: Arc<dyn Worker>) -> Self {
        self.registry.register(kind(name), worker);
        self.gates.insert(kind(name), gate(name, 85.0));
        self
    }

    fn sequential(self, names: &[&str]) -> Orchestrator {
        let layout = PipelineLayout {
            sequence: names.iter().map(|n| kind(n)).collect(),
            phases: vec![],
        };
        Orchestrator::new(OrchestratorConfig::new(self.registry, self.gates).with_layout(layout))
    }

    fn parallel(self, phases: &[(&str, &[&str])]) -> Orchestrator {
        let layout = PipelineLayout {
            sequence: vec![],
            phases: phases
                .iter()
                .map(|(name, workers)| {
                    let kinds: Vec<WorkerKind> = workers.iter().map(|n| kind(n)).collect();
                    PhaseSpec::new(name, &kinds)
                })
                .collect(),
        };
        Orchestrator::new(OrchestratorConfig::new(self.registry, self.gates).with_layout(layout))
    }
}

// =============================================================================
// Sequential topology
// =============================================================================

mod sequential {
    use super::*;

    #[tokio::test]
    async fn test_three_passing_workers_complete() {
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(100.0)))
            .worker("b", Probe::new(good(100.0)))
            .worker("c", Probe::new(good(100.0)))
            .sequential(&["a", "b", "c"]);

        let record = orchestrator.run_sequential().await.unwrap();

        assert!(record.overall_success);
        assert_eq!(record.topology, Topology::Sequential);
        let statuses: Vec<RunStatus> = record.entries().iter().map(|(_, e)| e.status).collect();
        assert_eq!(statuses, vec![RunStatus::Completed; 3]);
    }

    #[tokio::test]
    async fn test_second_worker_failing_gate_blocks_third() {
        let third = Probe::new(good(100.0));
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(100.0)))
            .worker("b", Probe::new(good(0.0)))
            .worker("c", third.clone())
            .sequential(&["a", "b", "c"]);

        let record = orchestrator.run_sequential().await.unwrap();

        assert!(!record.overall_success);
        let b = record.entry(&kind("b")).unwrap();
        assert_eq!(b.status, RunStatus::Completed);
        assert!(!b.gate.as_ref().unwrap().passed);
        assert!(!b.gate.as_ref().unwrap().score_passed);

        let c = record.entry(&kind("c")).unwrap();
        assert_eq!(c.status, RunStatus::Blocked);
        assert!(c.result.is_none());
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_execution_failure_halts() {
        let orchestrator = Harness::new()
            .worker("a", Arc::new(StubWorker::new(StubFixture::failing("no toolchain"))))
            .worker("b", Probe::new(good(100.0)))
            .sequential(&["a", "b"]);

        let record = orchestrator.run_sequential().await.unwrap();

        assert!(!record.overall_success);
        let a = record.entry(&kind("a")).unwrap();
        assert_eq!(a.status, RunStatus::Failed);
        assert!(a.error.as_ref().unwrap().contains("no toolchain"));
        assert_eq!(record.entry(&kind("b")).unwrap().status, RunStatus::Blocked);
    }

    #[tokio::test]
    async fn test_context_comes_from_prior_worker_only() {
        let second = Probe::new(good(100.0).forward("from_b", true));
        let third = Probe::new(good(100.0));
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(100.0).forward("from_a", 1)))
            .worker("b", second.clone())
            .worker("c", third.clone())
            .sequential(&["a", "b", "c"]);

        orchestrator.run_sequential().await.unwrap();

        let seen_by_b = second.last_context();
        assert_eq!(seen_by_b.get("from_a"), Some(&json!(1)));

        let seen_by_c = third.last_context();
        assert_eq!(seen_by_c.get("from_b"), Some(&json!(true)));
        assert!(seen_by_c.get("from_a").is_none());
    }

    #[tokio::test]
    async fn test_first_worker_gets_empty_context() {
        let first = Probe::new(good(100.0));
        let orchestrator = Harness::new().worker("a", first.clone()).sequential(&["a"]);

        orchestrator.run_sequential().await.unwrap();
        assert!(first.last_context().is_empty());
    }
}

// =============================================================================
// Parallel topology
// =============================================================================

mod parallel {
    use super::*;

    #[tokio::test]
    async fn test_execution_failure_is_isolated_and_later_phases_skipped() {
        let integration = Probe::new(good(100.0));
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(95.0)))
            .worker("b", Arc::new(StubWorker::new(StubFixture::failing("lint crashed"))))
            .worker("c", Probe::new(good(95.0)))
            .worker("d", integration.clone())
            .parallel(&[("independent", &["a", "b", "c"]), ("integration", &["d"])]);

        let record = orchestrator.run_parallel().await.unwrap();

        assert!(!record.overall_success);

        let first = record.phase("independent").unwrap();
        assert_eq!(first.status, PhaseStatus::Failed);
        assert_eq!(first.workers[0].status, RunStatus::Completed);
        assert!(first.workers[0].gate_passed());
        assert_eq!(first.workers[1].status, RunStatus::Failed);
        assert_eq!(first.workers[2].status, RunStatus::Completed);
        assert!(first.workers[2].gate_passed());

        let second = record.phase("integration").unwrap();
        assert_eq!(second.status, PhaseStatus::Skipped);
        assert_eq!(second.workers[0].status, RunStatus::Blocked);
        assert_eq!(integration.calls(), 0);
    }

    #[tokio::test]
    async fn test_gate_failure_lets_siblings_finish() {
        let sibling = Probe::new(good(95.0));
        let orchestrator = Harness::new()
            .worker("low", Probe::new(good(10.0)))
            .worker("ok", sibling.clone())
            .worker("next", Probe::new(good(95.0)))
            .parallel(&[("first", &["low", "ok"]), ("second", &["next"])]);

        let record = orchestrator.run_parallel().await.unwrap();

        assert!(!record.overall_success);
        assert_eq!(sibling.calls(), 1);
        assert_eq!(record.phase("second").unwrap().status, PhaseStatus::Skipped);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_isolated() {
        let orchestrator = Harness::new()
            .worker("calm", Probe::new(good(95.0)))
            .worker("wild", Arc::new(Exploding))
            .parallel(&[("only", &["calm", "wild"])]);

        let record = orchestrator.run_parallel().await.unwrap();

        let calm = record.entry(&kind("calm")).unwrap();
        assert_eq!(calm.status, RunStatus::Completed);
        let wild = record.entry(&kind("wild")).unwrap();
        assert_eq!(wild.status, RunStatus::Failed);
        assert!(wild.error.as_ref().unwrap().contains("worker blew up"));
        assert!(!record.overall_success);
    }

    #[tokio::test]
    async fn test_later_declared_worker_wins_merge() {
        let downstream = Probe::new(good(100.0));
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(100.0).forward("k", 1).forward("a_only", "x")))
            .worker("b", Probe::new(good(100.0).forward("k", 2)))
            .worker("d", downstream.clone())
            .parallel(&[("first", &["a", "b"]), ("second", &["d"])]);

        for _ in 0..5 {
            let record = orchestrator.run_parallel().await.unwrap();
            assert!(record.overall_success);

            let context = downstream.last_context();
            assert_eq!(context.get("k"), Some(&json!(2)));
            assert_eq!(context.get("a_only"), Some(&json!("x")));
        }
    }

    #[tokio::test]
    async fn test_phase_members_share_the_same_context() {
        let left = Probe::new(good(100.0));
        let right = Probe::new(good(100.0));
        let orchestrator = Harness::new()
            .worker("up", Probe::new(good(100.0).forward("ready", true)))
            .worker("left", left.clone())
            .worker("right", right.clone())
            .parallel(&[("first", &["up"]), ("second", &["left", "right"])]);

        orchestrator.run_parallel().await.unwrap();

        assert_eq!(left.last_context(), right.last_context());
        assert_eq!(left.last_context().get("ready"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_record_layout_is_phased() {
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(100.0)))
            .parallel(&[("only", &["a"])]);

        let record = orchestrator.run_parallel().await.unwrap();
        assert!(matches!(record.stages, RunStages::Phased { .. }));
        assert_eq!(record.topology, Topology::Parallel);
    }
}

// =============================================================================
// Gates, configuration errors, feedback
// =============================================================================

mod cross_cutting {
    use super::*;

    #[tokio::test]
    async fn test_compliance_enforced_only_when_required() {
        let build = |required: bool| {
            let registry = WorkerRegistry::new()
                .with_worker(kind("a"), Probe::new(good(100.0).with_compliance(false)));
            let gates = GateSet::new().with_gate(kind("a"), gate("a", 85.0));
            let layout = PipelineLayout {
                sequence: vec![kind("a")],
                phases: vec![],
            };
            Orchestrator::new(
                OrchestratorConfig::new(registry, gates)
                    .with_layout(layout)
                    .with_compliance(required),
            )
        };

        let strict = build(true).run_sequential().await.unwrap();
        assert!(!strict.overall_success);
        let outcome = strict.entry(&kind("a")).unwrap().gate.clone().unwrap();
        assert!(!outcome.compliance_passed);
        assert!(outcome.score_passed);

        let relaxed = build(false).run_sequential().await.unwrap();
        assert!(relaxed.overall_success);
    }

    #[tokio::test]
    async fn test_missing_criterion_key_fails_gate() {
        let orchestrator = Harness::new()
            .worker("bare", Probe::new(WorkerOutput::new(100.0)))
            .sequential(&["bare"]);

        let record = orchestrator.run_sequential().await.unwrap();
        let outcome = record.entry(&kind("bare")).unwrap().gate.clone().unwrap();
        assert!(!outcome.criteria_passed);
        assert_eq!(outcome.failed_criteria, vec!["report.complete truthy".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_kind_aborts_before_dispatch() {
        let probe = Probe::new(good(100.0));
        let orchestrator = Harness::new().worker("a", probe.clone()).sequential(&["a", "ghost"]);

        let err = orchestrator.run_sequential().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownWorker { ref kind } if kind == "ghost"));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_is_pure_over_real_run() {
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(100.0).with_recommendation("Keep going")))
            .worker("b", Probe::new(good(50.0)))
            .worker("c", Probe::new(good(100.0)))
            .sequential(&["a", "b", "c"]);

        let record = orchestrator.run_sequential().await.unwrap();
        let snapshot = record.clone();
        let config = FeedbackConfig::default();

        let first = analyze(&record, &config);
        let second = analyze(&record, &config);

        assert_eq!(first, second);
        assert_eq!(record, snapshot);
        assert_eq!(first.status, WorkflowStatus::NeedsImprovement);
        assert_eq!(first.failed_gates.len(), 1);
        assert_eq!(first.failed_gates[0].kind, kind("b"));
        assert_eq!(first.blocked_workers.len(), 1);
        assert_eq!(first.worker_stats.len(), 2);
    }

    #[tokio::test]
    async fn test_saved_record_keeps_custom_kind_identity() {
        let load_test = WorkerKind::custom("Load_Test").unwrap();
        let orchestrator = Harness::new()
            .worker("Load_Test", Probe::new(good(100.0)))
            .sequential(&["Load_Test"]);

        let record = orchestrator.run_sequential().await.unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let saved: RunRecord = serde_json::from_str(&json).unwrap();

        let entry = saved.entry(&load_test).unwrap();
        assert_eq!(entry.kind, load_test);
        assert_eq!(entry.status, RunStatus::Completed);
        assert_eq!(
            analyze(&saved, &FeedbackConfig::default()).worker_stats[0].kind,
            load_test
        );
    }

    #[tokio::test]
    async fn test_custom_kind_spelling_a_builtin_is_rejected() {
        let probe = Probe::new(good(100.0));
        let orchestrator = Harness::new().worker("Testing", probe.clone()).sequential(&["Testing"]);

        let err = orchestrator.run_sequential().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidKind { .. }));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_score_keeps_record_readable() {
        let orchestrator = Harness::new()
            .worker("a", Probe::new(good(100.0)))
            .worker("b", Probe::new(good(f64::NAN)))
            .parallel(&[("only", &["a", "b"])]);

        let record = orchestrator.run_parallel().await.unwrap();
        assert!(!record.overall_success);
        assert_eq!(record.entry(&kind("b")).unwrap().status, RunStatus::Failed);

        let json = serde_json::to_string(&record).unwrap();
        let saved: RunRecord = serde_json::from_str(&json).unwrap();
        let report = analyze(&saved, &FeedbackConfig::default());
        assert_eq!(report.status, WorkflowStatus::NeedsImprovement);
    }

    #[tokio::test]
    async fn test_default_stub_pipeline_passes_both_topologies() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::with_stub_workers());

        let sequential = orchestrator.run(Topology::Sequential).await.unwrap();
        assert!(sequential.overall_success);
        assert_eq!(sequential.summary().gates_passed, 7);

        let parallel = orchestrator.run(Topology::Parallel).await.unwrap();
        assert!(parallel.overall_success);
        assert_ne!(sequential.run_id, parallel.run_id);
        for phase in ["independent", "coordinated", "integration"] {
            assert_eq!(parallel.phase(phase).unwrap().status, PhaseStatus::Completed);
        }
    }
}
