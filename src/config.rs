//! Configuration loaded from `stagegate.toml`.
//!
//! Settings are layered: built-in defaults, then the file, then the
//! environment, then CLI flags (applied by the `run` command).
//!
//! # Configuration File Format
//!
//! ```toml
//! [orchestrator]
//! compliance_required = true
//! worker_timeout_secs = 30
//!
//! [pipeline]
//! sequence = ["code-quality", "ui-ux", "performance", "testing", "security", "devops", "architecture"]
//!
//! [[pipeline.phases]]
//! name = "independent"
//! workers = ["code-quality", "ui-ux", "performance"]
//!
//! [gates.testing]
//! name = "Medical Testing Quality Gate"
//! required_score = 85.0
//! criteria = { "test_coverage.coverage_percentage" = { at_least = 85.0 } }
//!
//! [workers.security]
//! quality_score = 80.0
//! fail_with = "scanner unavailable"
//!
//! [feedback]
//! suggestions = ["Review the {failed_gates} failed gate(s)"]
//! ```
//!
//! `[gates.<kind>]` replaces the default gate for that kind and
//! `[workers.<kind>]` replaces the stub fixture; kinds not listed keep their
//! defaults. Unknown kind names define custom stages.

use crate::feedback::FeedbackConfig;
use crate::gates::{GateSet, QualityGate, default_gates};
use crate::orchestrator::{OrchestratorConfig, PipelineLayout};
use crate::record::Topology;
use crate::worker::{StubFixture, WorkerKind, default_fixtures, stub_registry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "stagegate.toml";

/// Environment variable overriding `orchestrator.compliance_required`.
pub const COMPLIANCE_ENV: &str = "STAGEGATE_COMPLIANCE_REQUIRED";

/// Starter file written by `stagegate config init`.
pub const CONFIG_TEMPLATE: &str = r#"# stagegate configuration

[orchestrator]
# Require every result to carry the compliance flag
compliance_required = true
# Per-worker execution limit in seconds (unset = no limit)
# worker_timeout_secs = 30

[pipeline]
sequence = ["code-quality", "ui-ux", "performance", "testing", "security", "devops", "architecture"]

[[pipeline.phases]]
name = "independent"
workers = ["code-quality", "ui-ux", "performance"]

[[pipeline.phases]]
name = "coordinated"
workers = ["testing", "security", "devops"]

[[pipeline.phases]]
name = "integration"
workers = ["architecture"]

# Override a gate:
# [gates.testing]
# name = "Medical Testing Quality Gate"
# required_score = 85.0
# criteria = { "test_coverage.coverage_percentage" = { at_least = 85.0 } }

# Override a stub worker:
# [workers.security]
# quality_score = 80.0
# fail_with = "scanner unavailable"
"#;

/// `[orchestrator]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSection {
    /// Enforce the compliance check in every gate
    #[serde(default = "default_compliance_required")]
    pub compliance_required: bool,
    /// Per-worker execution limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_timeout_secs: Option<u64>,
}

fn default_compliance_required() -> bool {
    true
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            compliance_required: default_compliance_required(),
            worker_timeout_secs: None,
        }
    }
}

/// The complete stagegate.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagegateToml {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub pipeline: PipelineLayout,
    /// Gate overrides by worker kind
    #[serde(default)]
    pub gates: BTreeMap<WorkerKind, QualityGate>,
    /// Stub fixture overrides by worker kind
    #[serde(default)]
    pub workers: BTreeMap<WorkerKind, StubFixture>,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl StagegateToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse stagegate.toml")
    }

    /// Load from `path`, or return defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize stagegate.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get compliance_required, with the environment taking precedence.
    pub fn compliance_required(&self) -> bool {
        resolve_compliance(
            std::env::var(COMPLIANCE_ENV).ok().as_deref(),
            self.orchestrator.compliance_required,
        )
    }

    pub fn worker_timeout(&self) -> Option<Duration> {
        self.orchestrator.worker_timeout_secs.map(Duration::from_secs)
    }

    /// Default gates with the file's overrides applied.
    pub fn effective_gates(&self) -> GateSet {
        let mut gates = default_gates();
        for (kind, gate) in &self.gates {
            gates.insert(kind.clone(), gate.clone());
        }
        gates
    }

    /// Default fixtures with the file's overrides applied.
    pub fn effective_fixtures(&self) -> std::collections::HashMap<WorkerKind, StubFixture> {
        let mut fixtures = default_fixtures();
        for (kind, fixture) in &self.workers {
            fixtures.insert(kind.clone(), fixture.clone());
        }
        fixtures
    }

    /// Build the orchestrator configuration backed by stub workers.
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new(stub_registry(self.effective_fixtures()), self.effective_gates())
            .with_compliance(self.compliance_required())
            .with_layout(self.pipeline.clone())
            .with_worker_timeout(self.worker_timeout())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.orchestrator.worker_timeout_secs == Some(0) {
            warnings.push("worker_timeout_secs = 0 would fail every worker".to_string());
        }

        for (kind, gate) in &self.gates {
            for warning in gate.validate() {
                warnings.push(format!("gates.{}: {}", kind, warning));
            }
        }

        for (kind, fixture) in &self.workers {
            let score = fixture.output.quality_score;
            if !(0.0..=100.0).contains(&score) {
                warnings.push(format!(
                    "workers.{}: quality_score {} is outside 0-100",
                    kind, score
                ));
            }
        }

        let gates = self.effective_gates();
        let fixtures = self.effective_fixtures();

        for topology in [Topology::Sequential, Topology::Parallel] {
            let kinds = self.pipeline.workers(topology);
            if kinds.is_empty() {
                warnings.push(format!("{} pipeline has no workers", topology));
            }

            let mut seen = HashSet::new();
            for kind in kinds {
                if !seen.insert(kind) {
                    warnings.push(format!(
                        "'{}' appears more than once in the {} pipeline",
                        kind, topology
                    ));
                }
                if !gates.contains(kind) {
                    warnings.push(format!("No gate defined for '{}' ({} pipeline)", kind, topology));
                }
                if !fixtures.contains_key(kind) {
                    warnings.push(format!("No worker defined for '{}' ({} pipeline)", kind, topology));
                }
            }
        }

        for phase in &self.pipeline.phases {
            if phase.workers.is_empty() {
                warnings.push(format!("Phase '{}' has no workers", phase.name));
            }
        }

        warnings
    }
}

/// Resolve the compliance flag: any value other than `false`/`0`/`no` in the
/// environment means required.
fn resolve_compliance(env_value: Option<&str>, file_value: bool) -> bool {
    match env_value {
        Some(value) => !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no"),
        None => file_value,
    }
}
