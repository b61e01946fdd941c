use std::path::PathBuf;

use clap::Parser;

use dirorch::config::WorkflowConfig;
use dirorch::error::DirorchError;
use dirorch::log::parse_log_level;
use dirorch::workflow_engine::WorkflowEngine;

#[derive(Parser)]
#[command(name = "dirorch", about = "Directory-backed workflow orchestrator")]
struct Cli {
    /// Path to a workflow configuration file, or a logical name resolved
    /// under `<config-home>/dirorch/workflows/<name>.yml`.
    workflow: String,

    /// Root directory entities live under (defaults to current directory).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Override the configuration's retry count for every hook.
    #[arg(long)]
    retries: Option<u32>,

    /// Runtime-state filename, resolved under `--root`.
    #[arg(long, default_value = ".dirorch_runtime.json")]
    state_file: String,

    /// One of: debug, info, warning, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match parse_log_level(&cli.log_level) {
        Ok(level) => dirorch::log::set_log_level(level),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DirorchError> {
    let config_path = resolve_workflow_path(&cli.workflow)?;
    let contents = std::fs::read_to_string(&config_path)?;

    let mut config = WorkflowConfig::from_yaml_str(&contents)?;
    if let Some(retries) = cli.retries {
        config.retries = retries;
    }

    let engine = WorkflowEngine::new(cli.root, config, &cli.state_file)?;
    engine.run().await
}

/// Resolve `workflow` as a direct file path, falling back to the logical
/// name `<config-home>/dirorch/workflows/<name>.yml`.
fn resolve_workflow_path(workflow: &str) -> Result<PathBuf, DirorchError> {
    let direct = PathBuf::from(workflow);
    if direct.is_file() {
        return Ok(direct);
    }

    let config_home = std::env::var_os("XDG_CONFIG_DIR")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok_or(DirorchError::NoConfigHome)?;

    let resolved = config_home
        .join("dirorch")
        .join("workflows")
        .join(format!("{}.yml", workflow));

    if resolved.is_file() {
        Ok(resolved)
    } else {
        Err(DirorchError::WorkflowNotFound { direct, resolved })
    }
}
