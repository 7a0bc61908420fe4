//! Quality gates deciding whether a worker's result lets the pipeline advance.
//!
//! A [`QualityGate`] is static policy: a score threshold, documentation-only
//! compliance requirements, and machine-checkable [`Criterion`]s keyed by a
//! dotted path into the worker's output. Evaluating a gate never mutates it;
//! every evaluation returns a fresh [`GateOutcome`].
//!
//! A result passes when all three checks hold:
//! 1. `quality_score >= required_score`
//! 2. compliance, when the orchestrator requires it
//! 3. every criterion, where a missing key always fails
//!
//! ## Example
//!
//! ```
//! use stagegate::gates::{Criterion, QualityGate};
//!
//! let gate = QualityGate::new("Testing Gate", 85.0)
//!     .with_requirement("85%+ test coverage")
//!     .with_criterion("test_coverage.coverage_percentage", Criterion::AtLeast(85.0));
//!
//! assert_eq!(gate.criteria.len(), 1);
//! ```

use crate::errors::OrchestratorError;
use crate::util::{is_truthy, lookup_path};
use crate::worker::{WorkerKind, WorkerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A machine-checkable requirement on one output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// The key exists and is not null.
    Present,
    /// The key exists and holds a truthy value.
    Truthy,
    /// The key holds exactly this value (numbers compare numerically).
    Equals(Value),
    /// The key holds a number greater than or equal to this.
    AtLeast(f64),
    /// The key holds a number less than or equal to this.
    AtMost(f64),
}

impl Criterion {
    /// Check a looked-up value. `None` means the key was missing.
    pub fn check(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };

        match self {
            Self::Present => !value.is_null(),
            Self::Truthy => is_truthy(value),
            Self::Equals(expected) => values_match(value, expected),
            Self::AtLeast(min) => value.as_f64().is_some_and(|v| v >= *min),
            Self::AtMost(max) => value.as_f64().is_some_and(|v| v <= *max),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Present => write!(f, "present"),
            Criterion::Truthy => write!(f, "truthy"),
            Criterion::Equals(v) => write!(f, "== {}", v),
            Criterion::AtLeast(v) => write!(f, ">= {}", v),
            Criterion::AtMost(v) => write!(f, "<= {}", v),
        }
    }
}

fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(e)) => a == e,
        _ => actual == expected,
    }
}

/// Acceptance policy for one worker kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    /// Human-readable gate name
    pub name: String,
    /// Minimum quality score (0-100)
    pub required_score: f64,
    /// Compliance requirements, for documentation only
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Dotted output path -> check
    #[serde(default)]
    pub criteria: BTreeMap<String, Criterion>,
}

impl QualityGate {
    pub fn new(name: &str, required_score: f64) -> Self {
        Self {
            name: name.to_string(),
            required_score,
            requirements: Vec::new(),
            criteria: BTreeMap::new(),
        }
    }

    /// Add a documentation-only requirement.
    pub fn with_requirement(mut self, requirement: &str) -> Self {
        self.requirements.push(requirement.to_string());
        self
    }

    /// Add a machine-checkable criterion at a dotted output path.
    pub fn with_criterion(mut self, path: &str, criterion: Criterion) -> Self {
        self.criteria.insert(path.to_string(), criterion);
        self
    }

    /// Evaluate a result against this gate.
    ///
    /// Pure: the outcome depends only on the gate, the result and the
    /// compliance flag.
    pub fn evaluate(&self, result: &WorkerResult, compliance_required: bool) -> GateOutcome {
        let score_passed = result.quality_score >= self.required_score;
        let compliance_passed = !compliance_required || result.medical_compliance;

        let failed_criteria: Vec<String> = self
            .criteria
            .iter()
            .filter(|(path, criterion)| !criterion.check(lookup_path(&result.output, path)))
            .map(|(path, criterion)| format!("{} {}", path, criterion))
            .collect();
        let criteria_passed = failed_criteria.is_empty();

        let passed = score_passed && compliance_passed && criteria_passed;

        let detail = if passed {
            format!(
                "score {:.1} >= {:.1}, all {} criteria met",
                result.quality_score,
                self.required_score,
                self.criteria.len()
            )
        } else {
            let mut reasons = Vec::new();
            if !score_passed {
                reasons.push(format!(
                    "score {:.1} below required {:.1}",
                    result.quality_score, self.required_score
                ));
            }
            if !compliance_passed {
                reasons.push("compliance required but not met".to_string());
            }
            if !criteria_passed {
                reasons.push(format!("criteria failed: {}", failed_criteria.join(", ")));
            }
            reasons.join("; ")
        };

        GateOutcome {
            kind: result.kind.clone(),
            gate_name: self.name.clone(),
            passed,
            score_passed,
            compliance_passed,
            criteria_passed,
            failed_criteria,
            detail,
        }
    }

    /// Validate the gate definition and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.name.trim().is_empty() {
            warnings.push("Gate name is empty".to_string());
        }
        if !(0.0..=100.0).contains(&self.required_score) {
            warnings.push(format!(
                "Gate '{}' required_score {} is outside 0-100",
                self.name, self.required_score
            ));
        }
        for path in self.criteria.keys() {
            if path.is_empty() || path.split('.').any(str::is_empty) {
                warnings.push(format!(
                    "Gate '{}' has malformed criterion path '{}'",
                    self.name, path
                ));
            }
        }
        warnings
    }
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    /// Worker kind the gate belongs to
    pub kind: WorkerKind,
    /// Name of the evaluated gate
    pub gate_name: String,
    /// Overall verdict
    pub passed: bool,
    /// Score threshold check
    pub score_passed: bool,
    /// Compliance check (true when compliance is not required)
    pub compliance_passed: bool,
    /// Criteria check
    pub criteria_passed: bool,
    /// Criteria that did not hold, as `path check`
    #[serde(default)]
    pub failed_criteria: Vec<String>,
    /// Human-readable explanation
    pub detail: String,
}

impl GateOutcome {
    /// Names of the checks that failed, in evaluation order.
    pub fn failed_checks(&self) -> Vec<&'static str> {
        let mut checks = Vec::new();
        if !self.score_passed {
            checks.push("score");
        }
        if !self.compliance_passed {
            checks.push("compliance");
        }
        if !self.criteria_passed {
            checks.push("criteria");
        }
        checks
    }
}

/// Gate definitions keyed by worker kind.
#[derive(Debug, Clone, Default)]
pub struct GateSet {
    gates: HashMap<WorkerKind, QualityGate>,
}

impl GateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or replace) the gate for a kind.
    pub fn insert(&mut self, kind: WorkerKind, gate: QualityGate) {
        self.gates.insert(kind, gate);
    }

    pub fn with_gate(mut self, kind: WorkerKind, gate: QualityGate) -> Self {
        self.insert(kind, gate);
        self
    }

    pub fn get(&self, kind: &WorkerKind) -> Option<&QualityGate> {
        self.gates.get(kind)
    }

    pub fn contains(&self, kind: &WorkerKind) -> bool {
        self.gates.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Gates sorted by kind, for stable display.
    pub fn iter_sorted(&self) -> Vec<(&WorkerKind, &QualityGate)> {
        let mut entries: Vec<_> = self.gates.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Evaluates results against a shared, immutable gate set.
#[derive(Debug, Clone)]
pub struct GateEvaluator {
    gates: Arc<GateSet>,
    compliance_required: bool,
}

impl GateEvaluator {
    pub fn new(gates: Arc<GateSet>, compliance_required: bool) -> Self {
        Self {
            gates,
            compliance_required,
        }
    }

    /// Whether a gate is defined for `kind`.
    pub fn covers(&self, kind: &WorkerKind) -> bool {
        self.gates.contains(kind)
    }

    /// Evaluate the gate for `kind` against `result`.
    pub fn evaluate(
        &self,
        kind: &WorkerKind,
        result: &WorkerResult,
    ) -> Result<GateOutcome, OrchestratorError> {
        let gate = self
            .gates
            .get(kind)
            .ok_or_else(|| OrchestratorError::MissingGate {
                kind: kind.to_string(),
            })?;

        let outcome = gate.evaluate(result, self.compliance_required);

        if outcome.passed {
            tracing::info!(worker = %kind, gate = %gate.name, "Quality gate passed");
        } else {
            tracing::warn!(
                worker = %kind,
                gate = %gate.name,
                score = outcome.score_passed,
                compliance = outcome.compliance_passed,
                criteria = outcome.criteria_passed,
                detail = %outcome.detail,
                "Quality gate failed"
            );
        }

        Ok(outcome)
    }
}

/// The default gate for every built-in worker kind.
pub fn default_gates() -> GateSet {
    GateSet::new()
        .with_gate(
            WorkerKind::CodeQuality,
            QualityGate::new("Code Quality Gate", 90.0)
                .with_requirement("TypeScript strict mode compliance")
                .with_requirement("Zero critical ESLint errors")
                .with_requirement("Medical-grade build optimization")
                .with_criterion("typescript_fixes", Criterion::Truthy)
                .with_criterion("build_optimization", Criterion::Truthy),
        )
        .with_gate(
            WorkerKind::UiUx,
            QualityGate::new("Medical UX Quality Gate", 90.0)
                .with_requirement("WCAG 2.1 AA accessibility compliance")
                .with_requirement("Medical-appropriate color schemes")
                .with_requirement("Stress-reducing interface design")
                .with_criterion("accessibility_score", Criterion::AtLeast(90.0))
                .with_criterion("medical_design_features", Criterion::Truthy),
        )
        .with_gate(
            WorkerKind::Performance,
            QualityGate::new("Performance Quality Gate", 85.0)
                .with_requirement("Bundle size <600KB for medical platform")
                .with_requirement("Core Web Vitals compliance")
                .with_requirement("PWA offline capability for study sessions")
                .with_criterion("pwa_implementation.offline_quizzes", Criterion::Truthy)
                .with_criterion("core_web_vitals", Criterion::Truthy),
        )
        .with_gate(
            WorkerKind::Testing,
            QualityGate::new("Medical Testing Quality Gate", 85.0)
                .with_requirement("85%+ test coverage")
                .with_requirement("Medical content accuracy validation")
                .with_requirement("Cross-browser compatibility")
                .with_criterion(
                    "test_coverage.coverage_percentage",
                    Criterion::AtLeast(85.0),
                )
                .with_criterion("medical_validation.usmle_compliance", Criterion::Truthy),
        )
        .with_gate(
            WorkerKind::Security,
            QualityGate::new("Medical Security & HIPAA Gate", 95.0)
                .with_requirement("HIPAA compliance for educational data")
                .with_requirement("Zero critical security vulnerabilities")
                .with_requirement("Medical-grade error handling")
                .with_criterion(
                    "hipaa_compliance.educational_data_protection",
                    Criterion::Truthy,
                )
                .with_criterion(
                    "security_assessment.vulnerabilities_found",
                    Criterion::Equals(Value::from(0)),
                ),
        )
        .with_gate(
            WorkerKind::Devops,
            QualityGate::new("Medical Platform DevOps Gate", 90.0)
                .with_requirement("99.9% uptime capability")
                .with_requirement("Medical education continuity")
                .with_requirement("Disaster recovery <4 hours")
                .with_criterion("monitoring_setup.uptime_monitoring", Criterion::Truthy)
                .with_criterion("deployment_optimization.zero_downtime", Criterion::Truthy),
        )
        .with_gate(
            WorkerKind::Architecture,
            QualityGate::new("Medical Education Architecture Gate", 90.0)
                .with_requirement("Scalable medical education architecture")
                .with_requirement("USMLE preparation platform suitability")
                .with_requirement("Enterprise-ready system design")
                .with_criterion(
                    "architectural_assessment.medical_domain_suitability",
                    Criterion::Truthy,
                )
                .with_criterion("enterprise_readiness.scalability", Criterion::Truthy),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::stub::default_fixtures;
    use crate::worker::WorkerOutput;
    use serde_json::json;
    use std::time::Duration;

    fn result_for(kind: WorkerKind, output: WorkerOutput) -> WorkerResult {
        WorkerResult::completed(kind, output, Duration::from_millis(10))
    }

    fn testing_gate() -> QualityGate {
        QualityGate::new("Testing Gate", 85.0)
            .with_criterion("test_coverage.coverage_percentage", Criterion::AtLeast(85.0))
    }

    fn covered(score: f64, coverage: f64) -> WorkerOutput {
        WorkerOutput::new(score).with_fact(
            "test_coverage",
            json!({"coverage_percentage": coverage}),
        )
    }

    #[test]
    fn test_gate_passes_when_all_checks_hold() {
        let result = result_for(WorkerKind::Testing, covered(90.0, 88.0));
        let outcome = testing_gate().evaluate(&result, true);

        assert!(outcome.passed);
        assert!(outcome.failed_checks().is_empty());
        assert!(outcome.failed_criteria.is_empty());
    }

    #[test]
    fn test_score_below_threshold_fails_regardless_of_other_fields() {
        let result = result_for(WorkerKind::Testing, covered(84.9, 100.0));
        let outcome = testing_gate().evaluate(&result, false);

        assert!(!outcome.passed);
        assert!(!outcome.score_passed);
        assert!(outcome.compliance_passed);
        assert!(outcome.criteria_passed);
        assert_eq!(outcome.failed_checks(), vec!["score"]);
    }

    #[test]
    fn test_score_equal_to_threshold_passes() {
        let result = result_for(WorkerKind::Testing, covered(85.0, 85.0));
        assert!(testing_gate().evaluate(&result, true).passed);
    }

    #[test]
    fn test_compliance_enforced_only_when_required() {
        let output = covered(99.0, 99.0).with_compliance(false);
        let result = result_for(WorkerKind::Testing, output);

        let strict = testing_gate().evaluate(&result, true);
        assert!(!strict.passed);
        assert!(strict.score_passed);
        assert!(strict.criteria_passed);
        assert_eq!(strict.failed_checks(), vec!["compliance"]);

        let lenient = testing_gate().evaluate(&result, false);
        assert!(lenient.passed);
    }

    #[test]
    fn test_missing_key_fails_criterion() {
        let result = result_for(WorkerKind::Testing, WorkerOutput::new(99.0));
        let outcome = testing_gate().evaluate(&result, true);

        assert!(!outcome.passed);
        assert!(!outcome.criteria_passed);
        assert_eq!(
            outcome.failed_criteria,
            vec!["test_coverage.coverage_percentage >= 85".to_string()]
        );
    }

    #[test]
    fn test_evaluation_does_not_leak_between_results() {
        let gate = testing_gate();
        let failing = result_for(WorkerKind::Testing, covered(10.0, 10.0));
        let passing = result_for(WorkerKind::Testing, covered(95.0, 95.0));

        assert!(!gate.evaluate(&failing, true).passed);
        assert!(gate.evaluate(&passing, true).passed);
        assert!(!gate.evaluate(&failing, true).passed);
    }

    #[test]
    fn test_criterion_checks() {
        assert!(Criterion::Present.check(Some(&json!(false))));
        assert!(!Criterion::Present.check(Some(&json!(null))));
        assert!(!Criterion::Truthy.check(Some(&json!([]))));
        assert!(Criterion::Equals(json!(0)).check(Some(&json!(0.0))));
        assert!(!Criterion::Equals(json!(0)).check(Some(&json!(3))));
        assert!(Criterion::Equals(json!("secure")).check(Some(&json!("secure"))));
        assert!(Criterion::AtMost(600000.0).check(Some(&json!(572000))));
        assert!(!Criterion::AtLeast(90.0).check(Some(&json!("94"))));
        assert!(!Criterion::Truthy.check(None));
    }

    #[test]
    fn test_criterion_parses_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            criteria: BTreeMap<String, Criterion>,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
[criteria]
"test_coverage.coverage_percentage" = { at_least = 85.0 }
"security_assessment.vulnerabilities_found" = { equals = 0 }
"core_web_vitals" = "truthy"
"#,
        )
        .unwrap();

        assert_eq!(
            parsed.criteria["test_coverage.coverage_percentage"],
            Criterion::AtLeast(85.0)
        );
        assert_eq!(
            parsed.criteria["security_assessment.vulnerabilities_found"],
            Criterion::Equals(json!(0))
        );
        assert_eq!(parsed.criteria["core_web_vitals"], Criterion::Truthy);
    }

    #[test]
    fn test_default_fixtures_pass_default_gates() {
        let gates = default_gates();
        let fixtures = default_fixtures();

        for kind in WorkerKind::BUILTIN.iter() {
            let fixture = fixtures.get(kind).unwrap();
            let result = result_for(kind.clone(), fixture.output.clone());
            let outcome = gates.get(kind).unwrap().evaluate(&result, true);
            assert!(outcome.passed, "{} failed: {}", kind, outcome.detail);
        }
    }

    #[test]
    fn test_evaluator_reports_missing_gate() {
        let evaluator = GateEvaluator::new(Arc::new(GateSet::new()), true);
        let result = result_for(WorkerKind::Devops, WorkerOutput::new(99.0));
        let err = evaluator.evaluate(&WorkerKind::Devops, &result).unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingGate { .. }));
    }

    #[test]
    fn test_gate_validate() {
        assert!(default_gates().get(&WorkerKind::Security).unwrap().validate().is_empty());

        let bad = QualityGate::new("", 120.0).with_criterion("a..b", Criterion::Present);
        assert_eq!(bad.validate().len(), 3);
    }
}
