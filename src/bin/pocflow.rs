use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pocflow::cli::{model_summaries, phase_summaries, validate_phase};
use pocflow::utils::LoggingConfig;
use pocflow::{
    assemble, DynLlmClient, LocalEchoClient, ModelRegistry, Phase, RunConfig, ScriptedClient,
};

#[derive(Parser)]
#[command(name = "pocflow", version, about = "PoC generation workflow runner", author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one workflow to completion
    Run {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        phase: Option<Phase>,
        #[arg(long)]
        model: Option<String>,
        /// Use the local echo client instead of a model endpoint
        #[arg(long)]
        dry_run: bool,
        /// Replay model responses from a JSON array
        #[arg(long, conflicts_with = "dry_run")]
        script: Option<PathBuf>,
    },
    /// List phases with their node sets
    Phases,
    /// List the model registry
    Models,
    /// Build and validate the workflow of a phase
    Validate {
        #[arg(long)]
        phase: Phase,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            phase,
            model,
            dry_run,
            script,
        } => handle_run(config, phase, model, dry_run, script).await?,
        Command::Phases => {
            LoggingConfig::init(None)?;
            println!("{}", serde_json::to_string_pretty(&phase_summaries())?);
        }
        Command::Models => {
            LoggingConfig::init(None)?;
            let models = ModelRegistry::builtin();
            println!("{}", serde_json::to_string_pretty(&model_summaries(&models))?);
        }
        Command::Validate { phase, config } => {
            LoggingConfig::init(None)?;
            let mut run_config = match config {
                Some(path) => RunConfig::from_file(path)?,
                None => RunConfig::default(),
            };
            run_config.phase = phase;
            let nodes = validate_phase(&run_config, &ModelRegistry::builtin())?;
            let names: Vec<&str> = nodes.iter().map(|node| node.as_str()).collect();
            println!("{phase}: ok ({})", names.join(", "));
        }
    }
    Ok(())
}

async fn handle_run(
    config_path: PathBuf,
    phase: Option<Phase>,
    model: Option<String>,
    dry_run: bool,
    script: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = RunConfig::from_file(&config_path)?;
    if let Some(phase) = phase {
        config.phase = phase;
    }
    if let Some(model) = model {
        config.model_key = model;
    }

    let log_file = config
        .paths
        .log_dir()
        .join(format!("{}.log", config.run_id));
    LoggingConfig::init(Some(&log_file))?;

    let models = ModelRegistry::builtin();
    let client: DynLlmClient = match (script, dry_run) {
        (Some(path), _) => Arc::new(ScriptedClient::from_file(path)?),
        (None, true) => Arc::new(LocalEchoClient),
        (None, false) => models.build_client(&config.model_key)?,
    };

    let assembly = assemble(&config, &models, client)?;
    assembly
        .workspace
        .ensure()
        .await
        .context("failed to prepare run workspace")?;

    let mut state = assembly.state;
    let report = assembly.engine.run(&mut state).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
