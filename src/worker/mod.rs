//! Worker contract and registry.
//!
//! A worker is one pipeline stage. It receives the forwarded context
//! accumulated from its upstream stages and produces a scored
//! [`WorkerOutput`]. The executor turns that output into a timestamped
//! [`WorkerResult`]; an `Err` from the worker becomes a `failed` outcome for
//! that worker alone.
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use stagegate::errors::WorkerError;
//! use stagegate::worker::{ContextMap, Worker, WorkerKind, WorkerOutput, WorkerRegistry};
//! use std::sync::Arc;
//!
//! struct Linter;
//!
//! #[async_trait]
//! impl Worker for Linter {
//!     async fn execute(
//!         &self,
//!         _kind: &WorkerKind,
//!         _context: &ContextMap,
//!     ) -> Result<WorkerOutput, WorkerError> {
//!         Ok(WorkerOutput::new(97.0).with_recommendation("Enable strict mode"))
//!     }
//! }
//!
//! let mut registry = WorkerRegistry::new();
//! registry.register(WorkerKind::CodeQuality, Arc::new(Linter));
//! assert!(registry.contains(&WorkerKind::CodeQuality));
//! ```

mod kind;
pub mod stub;

pub use kind::WorkerKind;
pub use stub::{StubFixture, StubWorker, default_fixtures, stub_registry};

use crate::errors::WorkerError;
use crate::util::duration_serde;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Named values forwarded from upstream workers.
pub type ContextMap = Map<String, Value>;

/// Execution status of a single worker within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not dispatched yet
    #[default]
    Pending,
    /// Dispatched and running
    InProgress,
    /// Executed and produced a result
    Completed,
    /// Failed to execute
    Failed,
    /// Never dispatched because an upstream gate failed or its phase was skipped
    Blocked,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::InProgress => write!(f, "in_progress"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// What a worker hands back after executing successfully.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutput {
    /// Quality score on a 0-100 scale.
    #[serde(default)]
    pub quality_score: f64,
    /// Whether the result meets medical/domain compliance.
    #[serde(default = "default_compliance")]
    pub medical_compliance: bool,
    /// Human-readable recommendations, in order.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Values to forward to downstream workers.
    #[serde(default)]
    pub forwarded: ContextMap,
    /// Free-form facts produced by the worker, checked by gate criteria.
    #[serde(default)]
    pub output: ContextMap,
}

fn default_compliance() -> bool {
    true
}

impl WorkerOutput {
    /// Create an output with the given score, compliant and otherwise empty.
    pub fn new(quality_score: f64) -> Self {
        Self {
            quality_score,
            medical_compliance: true,
            ..Default::default()
        }
    }

    /// Set the compliance flag.
    pub fn with_compliance(mut self, compliant: bool) -> Self {
        self.medical_compliance = compliant;
        self
    }

    /// Append a recommendation.
    pub fn with_recommendation(mut self, recommendation: &str) -> Self {
        self.recommendations.push(recommendation.to_string());
        self
    }

    /// Add one forwarded context value.
    pub fn forward(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.forwarded.insert(key.to_string(), value.into());
        self
    }

    /// Add one output fact.
    pub fn with_fact(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.output.insert(key.to_string(), value.into());
        self
    }
}

/// Result of one worker invocation, built by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Which stage produced this result
    pub kind: WorkerKind,
    /// Terminal status of the invocation
    pub status: RunStatus,
    /// Wall-clock time spent in the worker
    #[serde(with = "duration_serde", rename = "elapsed_ms")]
    pub elapsed: Duration,
    /// Free-form payload
    pub output: ContextMap,
    /// Quality score on a 0-100 scale
    pub quality_score: f64,
    /// Medical/domain compliance flag
    pub medical_compliance: bool,
    /// Recommendations in the order the worker produced them
    pub recommendations: Vec<String>,
    /// Context forwarded to dependent workers
    pub forwarded: ContextMap,
    /// When the worker finished
    pub completed_at: DateTime<Utc>,
}

impl WorkerResult {
    /// Wrap a worker's output into a completed result.
    pub fn completed(kind: WorkerKind, output: WorkerOutput, elapsed: Duration) -> Self {
        Self {
            kind,
            status: RunStatus::Completed,
            elapsed,
            output: output.output,
            quality_score: output.quality_score,
            medical_compliance: output.medical_compliance,
            recommendations: output.recommendations,
            forwarded: output.forwarded,
            completed_at: Utc::now(),
        }
    }
}

/// The capability every pipeline stage implements.
///
/// Implementations must accept an empty context and must not rely on any
/// state shared with sibling workers. Retries and timeouts of the underlying
/// tooling belong to the implementation; a timeout should be reported as
/// [`WorkerError::TimedOut`].
#[async_trait]
pub trait Worker: Send + Sync {
    /// Execute the stage against the upstream forwarded context.
    async fn execute(
        &self,
        kind: &WorkerKind,
        context: &ContextMap,
    ) -> Result<WorkerOutput, WorkerError>;
}

/// Mapping from worker kind to its implementation.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerKind, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the implementation for a kind.
    pub fn register(&mut self, kind: WorkerKind, worker: Arc<dyn Worker>) {
        self.workers.insert(kind, worker);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_worker(mut self, kind: WorkerKind, worker: Arc<dyn Worker>) -> Self {
        self.register(kind, worker);
        self
    }

    /// Look up the implementation for a kind.
    pub fn get(&self, kind: &WorkerKind) -> Option<Arc<dyn Worker>> {
        self.workers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &WorkerKind) -> bool {
        self.workers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.workers.keys().map(WorkerKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("WorkerRegistry").field("kinds", &kinds).finish()
    }
}
