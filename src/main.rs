//! ollamacode - command-line entry point

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use ollamacode::cli::{Args, Commands, Config, Verbosity};
use ollamacode::repl::ReplSession;
use ollamacode::streaming::OllamaClient;
use ollamacode::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Err(message) = args.validate() {
        bail!(message);
    }

    let config = load_config(&args)?;
    let verbosity = Verbosity::parse(&config.telemetry.default_verbosity).unwrap_or(Verbosity::Normal);
    init_tracing(verbosity);
    if !config.telemetry.color_output {
        colored::control::set_override(false);
    }

    match (&args.command, &args.task) {
        (Some(Commands::Models), _) => list_models(&config).await,
        (Some(Commands::Config), _) => show_config(&config),
        (Some(Commands::Start), _) | (None, None) => run_repl(&args, &config, verbosity).await,
        (None, Some(task)) => run_task(&args, &config, verbosity, task).await,
    }
}

/// Config file (explicit or default location) with CLI flags on top
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn project_root(args: &Args) -> Result<std::path::PathBuf> {
    let root = args.working_dir();
    if !root.is_dir() {
        bail!("Project root {} is not a directory", root.display());
    }
    Ok(root)
}

async fn run_repl(args: &Args, config: &Config, verbosity: Verbosity) -> Result<()> {
    let mut session = ReplSession::from_config(config, project_root(args)?, verbosity)?;
    session.run().await
}

/// One turn without the REPL; prompts are still answered on stdin
async fn run_task(args: &Args, config: &Config, verbosity: Verbosity, task: &str) -> Result<()> {
    let mut session = ReplSession::from_config(config, project_root(args)?, verbosity)?;
    if !session.turn(task).await {
        bail!("The request could not be completed");
    }
    Ok(())
}

async fn list_models(config: &Config) -> Result<()> {
    let client = OllamaClient::with_config(
        &config.ollama_url(),
        &config.ollama.default_model,
        config.ollama.request_timeout_secs,
    )?;
    let models = client
        .list_models()
        .await
        .with_context(|| format!("Is Ollama running at {}?", client.base_url()))?;

    if models.is_empty() {
        println!("No models installed. Pull one with `ollama pull {}`.", config.ollama.default_model);
        return Ok(());
    }

    println!("{}", "Available models".bold().cyan());
    for model in models {
        let marker = if model == config.ollama.default_model {
            " (default)".green().to_string()
        } else {
            String::new()
        };
        println!("  {}{}", model, marker);
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("{} {}", "# Configuration file:".dimmed(), Config::default_path().display());
    print!("{}", config.to_toml()?);
    Ok(())
}
