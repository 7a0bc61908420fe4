use anyhow::Result;
use clap::{Parser, Subcommand};
use stagegate::config::DEFAULT_CONFIG_FILE;
use stagegate::record::Topology;
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "stagegate")]
#[command(version, about = "Gated multi-stage workflow orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the worker pipeline and print the run record as JSON
    Run {
        /// Execution topology: sequential or parallel
        #[arg(short, long, default_value = "sequential")]
        topology: Topology,

        /// Also write the run record to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a feedback report to stderr after the run
        #[arg(long)]
        feedback: bool,

        /// Skip the compliance check regardless of configuration
        #[arg(long)]
        no_compliance: bool,
    },
    /// Analyze a saved run record
    Analyze {
        /// Path to a run record JSON file
        record: PathBuf,

        /// Print a table instead of JSON
        #[arg(long)]
        table: bool,
    },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default stagegate.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "stagegate=debug"
    } else {
        "stagegate=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run {
            topology,
            output,
            feedback,
            no_compliance,
        } => {
            let success = cmd::cmd_run(
                &cli.config,
                *topology,
                output.as_deref(),
                *feedback,
                *no_compliance,
            )
            .await?;
            if !success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Analyze { record, table } => cmd::cmd_analyze(&cli.config, record, *table)?,
        Commands::Config { command } => cmd::cmd_config(&cli.config, command.clone())?,
    }

    Ok(ExitCode::SUCCESS)
}
