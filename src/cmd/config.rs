//! Configuration view and validation commands — `stagegate config`.

use anyhow::{Context, Result};
use stagegate::config::{CONFIG_TEMPLATE, StagegateToml};

use super::super::ConfigCommands;

pub fn cmd_config(config_path: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Stagegate Configuration");
            println!("=======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                StagegateToml::load(config_path)?
            } else {
                println!("No config file at {}; using defaults.", config_path.display());
                StagegateToml::default()
            };
            println!();

            println!("[orchestrator]");
            println!(
                "  compliance_required = {}",
                toml.orchestrator.compliance_required
            );
            match toml.orchestrator.worker_timeout_secs {
                Some(secs) => println!("  worker_timeout_secs = {}", secs),
                None => println!("  worker_timeout_secs = (none)"),
            }
            println!();

            println!("[pipeline]");
            let sequence: Vec<&str> = toml.pipeline.sequence.iter().map(|k| k.as_str()).collect();
            println!("  sequence = {}", sequence.join(" -> "));
            for phase in &toml.pipeline.phases {
                let workers: Vec<&str> = phase.workers.iter().map(|k| k.as_str()).collect();
                println!("  phase {} = {}", phase.name, workers.join(", "));
            }
            println!();

            println!("Gates:");
            println!(
                "  {:<14} {:<38} {:<6} {:<8}",
                "Worker", "Gate", "Score", "Criteria"
            );
            let gates = toml.effective_gates();
            for (kind, gate) in gates.iter_sorted() {
                println!(
                    "  {:<14} {:<38} {:<6.0} {:<8}",
                    kind.as_str(),
                    gate.name,
                    gate.required_score,
                    gate.criteria.len()
                );
            }
            println!();

            println!("Effective values (with env overrides):");
            println!("  compliance_required = {}", toml.compliance_required());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = if config_path.exists() {
                StagegateToml::load(config_path)?
            } else {
                println!("No config file found. Using defaults.");
                StagegateToml::default()
            };
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::write(config_path, CONFIG_TEMPLATE)
                .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [orchestrator] compliance_required, worker_timeout_secs");
            println!("  - [pipeline] sequence and phases");
            println!("  - [gates.<worker>] and [workers.<worker>] overrides");
            println!();
        }
    }

    Ok(())
}
