//! Feedback analysis of a saved run — `stagegate analyze`.

use anyhow::{Context, Result};
use stagegate::config::StagegateToml;
use stagegate::feedback::{analyze, render_report};
use stagegate::record::RunRecord;
use std::path::Path;

pub fn cmd_analyze(config_path: &Path, record_path: &Path, table: bool) -> Result<()> {
    let content = std::fs::read_to_string(record_path)
        .with_context(|| format!("Failed to read run record: {}", record_path.display()))?;
    let record: RunRecord = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse run record: {}", record_path.display()))?;

    let toml = StagegateToml::load_or_default(config_path)?;
    let report = analyze(&record, &toml.feedback);

    if table {
        print!("{}", render_report(&report));
    } else {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize feedback report")?;
        println!("{}", json);
    }

    Ok(())
}
