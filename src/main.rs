use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use stepwright::config::{load_config_with_options, LoadOptions};
use stepwright::{flow, inspect, telemetry, EngineConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "stepwright", version, about = "Audit tooling for stepwright runs")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Statically validate a flow file
    Validate(ValidateArgs),

    /// Reconstruct a run's outcome from its directory
    Inspect(InspectArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct ValidateArgs {
    /// Flow file (YAML, or JSON by extension)
    flow: PathBuf,
}

#[derive(Args)]
struct InspectArgs {
    /// Run directory containing trace.jsonl
    run_dir: PathBuf,

    /// Re-hash every evidence file against the manifest
    #[arg(long)]
    verify: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Validate(args) => cmd_validate(args),
        Commands::Inspect(args) => cmd_inspect(args),
        Commands::Config => cmd_config(cli.config),
    }
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let actions = flow::load_flow(&args.flow)?;
    if let Err(err) = action_compiler::validate_flow(&actions) {
        bail!("{}: {err}", args.flow.display());
    }
    info!(actions = actions.len(), "flow valid");
    println!("ok: {} actions", actions.len());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let summary = inspect::load_run(&args.run_dir)
        .with_context(|| format!("Failed to load run {}", args.run_dir.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if args.verify {
        let issues = inspect::verify_evidence(&args.run_dir)?;
        if !issues.is_empty() {
            for issue in &issues {
                eprintln!("integrity: {} {}", issue.path, issue.problem);
            }
            bail!("{} evidence files failed verification", issues.len());
        }
        println!("evidence verified: {} items", summary.evidence_items);
    }
    Ok(())
}

fn cmd_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_effective_config(path)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

/// Explicit `--config` must exist; the default location is optional
fn load_effective_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    if let Some(path) = path {
        return stepwright::load_config(Some(&path))
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(dir) = dirs::config_dir() {
        options.paths.push(dir.join("stepwright").join("config.yaml"));
    }
    Ok(load_config_with_options(&options)?)
}
