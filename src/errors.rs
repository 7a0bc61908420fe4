//! Typed error hierarchy for the stagegate orchestrator.
//!
//! Two top-level enums keep the failure classes apart:
//! - `OrchestratorError` — configuration problems that abort a whole run
//! - `WorkerError` — a single worker failing to execute
//!
//! A worker that executes but misses its quality gate is not an error at all;
//! it is recorded as a failed [`GateOutcome`](crate::gates::GateOutcome).

use std::time::Duration;
use thiserror::Error;

/// Errors that abort an entire orchestrator invocation.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("No worker registered for kind '{kind}'")]
    UnknownWorker { kind: String },

    #[error("No quality gate defined for kind '{kind}'")]
    MissingGate { kind: String },

    #[error("Pipeline layout for {topology} topology has no workers")]
    EmptyLayout { topology: String },

    #[error("Worker kind '{kind}' appears more than once in the {topology} layout")]
    DuplicateWorker { kind: String, topology: String },

    #[error("Custom worker kind '{kind}' is blank or spells a built-in kind")]
    InvalidKind { kind: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while a single worker executes.
///
/// These never abort a run; the executor records them as a `failed` outcome
/// for the worker that raised them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkerError {
    #[error("Worker execution failed: {message}")]
    Failed { message: String },

    #[error("Worker timed out after {limit:?}")]
    TimedOut { limit: Duration },

    #[error("Worker task panicked: {message}")]
    Panicked { message: String },
}

impl WorkerError {
    /// Shorthand for a plain execution failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_error_unknown_worker_carries_kind() {
        let err = OrchestratorError::UnknownWorker {
            kind: "linting".to_string(),
        };
        match &err {
            OrchestratorError::UnknownWorker { kind } => assert_eq!(kind, "linting"),
            _ => panic!("Expected UnknownWorker"),
        }
        assert!(err.to_string().contains("linting"));
    }

    #[test]
    fn orchestrator_error_converts_from_anyhow() {
        let err: OrchestratorError = anyhow::anyhow!("disk on fire").into();
        assert!(matches!(err, OrchestratorError::Other(_)));
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn worker_error_timeout_carries_limit() {
        let err = WorkerError::TimedOut {
            limit: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn worker_error_timeout_keeps_sub_second_limit() {
        let err = WorkerError::TimedOut {
            limit: Duration::from_millis(300),
        };
        assert_eq!(err.to_string(), "Worker timed out after 300ms");
    }

    #[test]
    fn worker_error_failed_shorthand() {
        let err = WorkerError::failed("scanner crashed");
        assert_eq!(
            err,
            WorkerError::Failed {
                message: "scanner crashed".to_string()
            }
        );
    }

    #[test]
    fn error_variants_are_distinct() {
        let missing_gate = OrchestratorError::MissingGate { kind: "x".into() };
        let unknown = OrchestratorError::UnknownWorker { kind: "x".into() };
        assert!(matches!(missing_gate, OrchestratorError::MissingGate { .. }));
        assert!(!matches!(unknown, OrchestratorError::MissingGate { .. }));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&OrchestratorError::Config("bad".into()));
        assert_std_error(&WorkerError::failed("bad"));
    }
}
