//! Pipeline execution — `stagegate run`.

use anyhow::{Context, Result};
use stagegate::config::StagegateToml;
use stagegate::events::RunEvent;
use stagegate::feedback::{analyze, render_report};
use stagegate::orchestrator::Orchestrator;
use stagegate::record::Topology;
use std::path::Path;
use tokio::sync::mpsc;

/// Run the pipeline. Returns whether the run succeeded.
pub async fn cmd_run(
    config_path: &Path,
    topology: Topology,
    output: Option<&Path>,
    feedback: bool,
    no_compliance: bool,
) -> Result<bool> {
    let toml = StagegateToml::load_or_default(config_path)?;
    for warning in toml.validate() {
        tracing::warn!(%warning, "Configuration warning");
    }

    let mut config = toml.to_orchestrator_config();
    if no_compliance {
        config.compliance_required = false;
    }

    let (tx, mut rx) = mpsc::channel::<RunEvent>(64);
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::debug!(event = %json, "Run event"),
                Err(e) => tracing::debug!(error = %e, "Unserializable run event"),
            }
        }
    });

    let orchestrator = Orchestrator::new(config).with_event_channel(tx);
    let record = orchestrator
        .run(topology)
        .await
        .context("Pipeline run aborted")?;
    drop(orchestrator);
    progress.await.ok();

    let json = serde_json::to_string_pretty(&record).context("Failed to serialize run record")?;

    if let Some(path) = output {
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write run record: {}", path.display()))?;
        tracing::info!(path = %path.display(), "Run record written");
    }

    println!("{}", json);

    if feedback {
        let report = analyze(&record, &toml.feedback);
        eprint!("{}", render_report(&report));
    }

    Ok(record.overall_success)
}
