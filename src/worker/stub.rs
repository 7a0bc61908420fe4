//! Fixture-backed stand-in workers.
//!
//! The real stages (linters, scanners, load tests, deploy tooling) live outside
//! this crate. [`StubWorker`] replays a configured [`StubFixture`] so the
//! pipeline can be exercised end to end, and [`default_fixtures`] provides one
//! fixture per built-in kind that satisfies that kind's default gate.

use super::{ContextMap, Worker, WorkerKind, WorkerOutput, WorkerRegistry};
use crate::errors::WorkerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Canned behaviour for a stub worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StubFixture {
    /// Output replayed on every invocation
    #[serde(flatten)]
    pub output: WorkerOutput,
    /// Simulated processing time in milliseconds
    #[serde(default)]
    pub delay_ms: u64,
    /// When set, the worker fails to execute with this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_with: Option<String>,
}

impl StubFixture {
    /// A compliant fixture with the given score and no payload.
    pub fn passing(quality_score: f64) -> Self {
        Self {
            output: WorkerOutput::new(quality_score),
            ..Default::default()
        }
    }

    /// A fixture that always fails to execute.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Replace the replayed output.
    pub fn with_output(mut self, output: WorkerOutput) -> Self {
        self.output = output;
        self
    }

    /// Set the simulated processing time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }
}

/// Worker that replays a fixture.
#[derive(Debug, Clone)]
pub struct StubWorker {
    fixture: StubFixture,
}

impl StubWorker {
    pub fn new(fixture: StubFixture) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl Worker for StubWorker {
    async fn execute(
        &self,
        kind: &WorkerKind,
        context: &ContextMap,
    ) -> Result<WorkerOutput, WorkerError> {
        tracing::debug!(
            worker = %kind,
            context_keys = context.len(),
            delay_ms = self.fixture.delay_ms,
            "Replaying stub fixture"
        );

        if self.fixture.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.fixture.delay_ms)).await;
        }

        match &self.fixture.fail_with {
            Some(message) => Err(WorkerError::failed(message.clone())),
            None => Ok(self.fixture.output.clone()),
        }
    }
}

/// Build a registry with one [`StubWorker`] per fixture.
pub fn stub_registry(fixtures: HashMap<WorkerKind, StubFixture>) -> WorkerRegistry {
    fixtures
        .into_iter()
        .fold(WorkerRegistry::new(), |registry, (kind, fixture)| {
            registry.with_worker(kind, Arc::new(StubWorker::new(fixture)))
        })
}

fn object(value: Value) -> ContextMap {
    match value {
        Value::Object(map) => map,
        _ => ContextMap::new(),
    }
}

fn fixture(score: f64, output: Value, recommendations: &[&str], forwarded: Value) -> StubFixture {
    StubFixture {
        output: WorkerOutput {
            quality_score: score,
            medical_compliance: true,
            recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
            forwarded: object(forwarded),
            output: object(output),
        },
        delay_ms: 0,
        fail_with: None,
    }
}

/// One passing fixture per built-in worker kind.
pub fn default_fixtures() -> HashMap<WorkerKind, StubFixture> {
    let mut fixtures = HashMap::new();

    fixtures.insert(
        WorkerKind::CodeQuality,
        fixture(
            95.0,
            json!({
                "typescript_fixes": ["Export fixes in QuizSessionManager", "Type-only imports"],
                "lint_issues_resolved": 10,
                "build_optimization": {
                    "bundle_size_reduction": "8.5%",
                    "build_time_improvement": "13%"
                }
            }),
            &[
                "Implement strict TypeScript configuration",
                "Add medical domain type definitions",
                "Optimize build pipeline for medical platform",
            ],
            json!({
                "code_quality_status": "optimized",
                "typescript_compliance": true,
                "medical_code_standards": true
            }),
        ),
    );

    fixtures.insert(
        WorkerKind::UiUx,
        fixture(
            94.0,
            json!({
                "ui_improvements": [
                    "Minimalistic dashboard with 4 essential stats cards",
                    "Medical-appropriate color scheme",
                    "WCAG 2.1 AA accessibility compliance"
                ],
                "accessibility_score": 94.0,
                "medical_design_features": [
                    "Stress-reducing interface for exam preparation",
                    "Professional medical iconography",
                    "Calming color palette"
                ]
            }),
            &[
                "Add medical specialty color coding",
                "Implement USMLE progress visualization",
                "Enhance mobile medical student workflow",
            ],
            json!({
                "ui_optimized": true,
                "medical_design_compliant": true,
                "accessibility_ready": true
            }),
        ),
    );

    fixtures.insert(
        WorkerKind::Performance,
        fixture(
            97.0,
            json!({
                "bundle_optimization": {
                    "original_size": "625KB",
                    "optimized_size": "572KB",
                    "reduction_percentage": "8.5%"
                },
                "pwa_implementation": {
                    "offline_quizzes": true,
                    "service_worker": true,
                    "caching_strategy": "medical_education_optimized"
                },
                "core_web_vitals": {"LCP": "<2.5s", "FID": "<100ms", "CLS": "<0.1"}
            }),
            &[
                "Implement question prefetching for medical students",
                "Add progressive loading for large medical content",
                "Optimize for slow hospital Wi-Fi connections",
            ],
            json!({
                "performance_optimized": true,
                "pwa_enabled": true,
                "medical_performance_standards": true
            }),
        ),
    );

    fixtures.insert(
        WorkerKind::Testing,
        fixture(
            94.0,
            json!({
                "test_coverage": {
                    "unit_tests": "180+ tests",
                    "coverage_percentage": 85.0,
                    "medical_scenarios": true
                },
                "medical_validation": {
                    "usmle_compliance": true,
                    "medical_content_accuracy": true,
                    "clinical_scenario_testing": true
                },
                "cross_browser_testing": {
                    "chrome": true,
                    "firefox": true,
                    "safari": true,
                    "mobile_devices": true
                }
            }),
            &[
                "Add medical education workflow tests",
                "Implement USMLE question format validation",
                "Enhance accessibility testing coverage",
            ],
            json!({
                "testing_comprehensive": true,
                "medical_validation_complete": true,
                "quality_assured": true
            }),
        ),
    );

    fixtures.insert(
        WorkerKind::Security,
        fixture(
            97.0,
            json!({
                "hipaa_compliance": {
                    "educational_data_protection": true,
                    "error_logging_sanitized": true,
                    "no_pii_exposure": true
                },
                "security_assessment": {
                    "vulnerabilities_found": 0,
                    "authentication_security": "excellent",
                    "session_management": "secure"
                }
            }),
            &[
                "Implement medical institution SSO integration",
                "Add advanced audit trails for medical compliance",
                "Enhance medical data protection measures",
            ],
            json!({
                "security_validated": true,
                "hipaa_compliant": true,
                "medical_security_ready": true
            }),
        ),
    );

    fixtures.insert(
        WorkerKind::Devops,
        fixture(
            96.0,
            json!({
                "ci_cd_pipeline": {
                    "github_actions_workflows": 7,
                    "medical_quality_gates": true
                },
                "monitoring_setup": {
                    "uptime_monitoring": "99.9%",
                    "disaster_recovery": "15-minute RPO, 4-hour RTO"
                },
                "deployment_optimization": {
                    "zero_downtime": true,
                    "medical_continuity": true,
                    "global_cdn": true
                }
            }),
            &[
                "Implement medical school integration monitoring",
                "Add USMLE exam period enhanced monitoring",
                "Optimize for international medical students",
            ],
            json!({
                "devops_ready": true,
                "medical_reliability_assured": true,
                "production_deployment_ready": true
            }),
        ),
    );

    fixtures.insert(
        WorkerKind::Architecture,
        fixture(
            94.0,
            json!({
                "architectural_assessment": {
                    "medical_domain_suitability": "Outstanding",
                    "scalability_readiness": "Enterprise-grade"
                },
                "system_integration": {
                    "agent_coordination": "Excellent",
                    "component_cohesion": "Unified system"
                },
                "enterprise_readiness": {
                    "scalability": "10,000+ concurrent medical students",
                    "multi_tenant_ready": true
                }
            }),
            &[
                "Plan advanced medical analytics",
                "Prepare global medical platform expansion",
                "Consider medical AI integration opportunities",
            ],
            json!({
                "architecture_validated": true,
                "medical_platform_excellence": true,
                "production_ready": true
            }),
        ),
    );

    fixtures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fixtures_cover_builtin_kinds() {
        let fixtures = default_fixtures();
        for kind in WorkerKind::BUILTIN.iter() {
            let fixture = fixtures.get(kind).unwrap();
            assert!(fixture.fail_with.is_none());
            assert!(fixture.output.quality_score >= 90.0);
            assert!(!fixture.output.forwarded.is_empty());
        }
    }

    #[test]
    fn test_stub_registry_registers_every_fixture() {
        let registry = stub_registry(default_fixtures());
        assert_eq!(registry.len(), WorkerKind::BUILTIN.len());
        assert!(registry.contains(&WorkerKind::Architecture));
    }

    #[tokio::test]
    async fn test_stub_worker_replays_output() {
        let worker = StubWorker::new(StubFixture::passing(88.0));
        let output = worker
            .execute(&WorkerKind::Testing, &ContextMap::new())
            .await
            .unwrap();
        assert_eq!(output.quality_score, 88.0);
    }

    #[tokio::test]
    async fn test_stub_worker_failure() {
        let worker = StubWorker::new(StubFixture::failing("scanner unavailable"));
        let err = worker
            .execute(&WorkerKind::Security, &ContextMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, WorkerError::failed("scanner unavailable"));
    }

    #[test]
    fn test_fixture_parses_from_toml() {
        let fixture: StubFixture = toml::from_str(
            r#"
quality_score = 70.0
medical_compliance = false
delay_ms = 25
recommendations = ["Raise coverage"]

[output.test_coverage]
coverage_percentage = 60.0

[forwarded]
quality_assured = false
"#,
        )
        .unwrap();

        assert_eq!(fixture.output.quality_score, 70.0);
        assert!(!fixture.output.medical_compliance);
        assert_eq!(fixture.delay_ms, 25);
        assert_eq!(
            fixture.output.output["test_coverage"]["coverage_percentage"],
            json!(60.0)
        );
        assert_eq!(fixture.output.forwarded["quality_assured"], json!(false));
    }
}
