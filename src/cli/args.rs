//! Command-line argument parsing for ollamacode
//!
//! Flags given here override the matching config file values.

use super::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ollamacode - a terminal coding assistant on top of local Ollama models
#[derive(Parser, Debug)]
#[command(name = "ollamacode")]
#[command(author, version)]
#[command(about = "Turn local Ollama replies into validated file edits, web lookups and shell commands", long_about = None)]
pub struct Args {
    /// Run a single request and exit instead of starting the REPL
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Ollama model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ollama host
    #[arg(long)]
    pub host: Option<String>,

    /// Ollama port
    #[arg(long)]
    pub port: Option<u16>,

    /// Project root (current directory by default)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Disable web search
    #[arg(long)]
    pub no_web: bool,

    /// Apply file changes without asking first
    #[arg(long)]
    pub yes: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only errors on stderr
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive REPL mode
    Start,

    /// List available Ollama models
    Models,

    /// Display the effective configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.cwd
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_some() && self.task.is_some() {
            return Err("Cannot specify a task together with a subcommand.".to_string());
        }
        if matches!(&self.task, Some(task) if task.trim().is_empty()) {
            return Err("Task must not be empty.".to_string());
        }
        Ok(())
    }

    /// Overlay the flags that were given onto `config`
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.ollama.default_model = model.clone();
        }
        if let Some(host) = &self.host {
            config.ollama.host = host.clone();
        }
        if let Some(port) = self.port {
            config.ollama.port = port;
        }
        if self.no_web {
            config.search.enabled = false;
        }
        if self.yes {
            config.writes.confirm = false;
        }
        if self.verbose > 0 || self.quiet {
            config.telemetry.default_verbosity = self.verbosity().as_str().to_string();
        }
    }
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Inverse of [`Verbosity::as_str`]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quiet" => Some(Verbosity::Quiet),
            "normal" => Some(Verbosity::Normal),
            "verbose" => Some(Verbosity::Verbose),
            "very_verbose" => Some(Verbosity::VeryVerbose),
            _ => None,
        }
    }

    /// Spinners and status lines
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Correction attempts, search ranking and other step detail
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }

    /// Stream reply tokens while they arrive
    pub fn show_tokens(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("ollamacode").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&[]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["-q"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["-v"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["-vv"]).verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["ollamacode", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_no_arguments_means_repl() {
        let args = parse(&[]);
        assert!(args.task.is_none());
        assert!(args.command.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_task_and_subcommand() {
        assert_eq!(parse(&["models"]).command, Some(Commands::Models));
        assert_eq!(parse(&["write a fizzbuzz"]).task.as_deref(), Some("write a fizzbuzz"));
        assert!(parse(&["   "]).validate().is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&["--model", "llama3", "--port", "8080", "--no-web", "--yes", "-v"]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.ollama.default_model, "llama3");
        assert_eq!(config.ollama.port, 8080);
        assert_eq!(config.ollama.host, "127.0.0.1");
        assert!(!config.search.enabled);
        assert!(!config.writes.confirm);
        assert_eq!(config.telemetry.default_verbosity, "verbose");
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = Config::default();
        config.ollama.default_model = "from-file".to_string();
        parse(&[]).apply_to(&mut config);
        assert_eq!(config.ollama.default_model, "from-file");
        assert!(config.writes.confirm);
    }

    #[test]
    fn test_verbosity_round_trip_names() {
        for level in [Verbosity::Quiet, Verbosity::Normal, Verbosity::Verbose, Verbosity::VeryVerbose] {
            assert_eq!(Verbosity::parse(level.as_str()), Some(level));
        }
        assert_eq!(Verbosity::parse("loud"), None);
    }
}
