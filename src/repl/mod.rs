//! Interactive session
//!
//! Wires the real collaborators (Ollama, web search, local disk, terminal
//! prompts, shell) to the orchestrator and runs the read-eval-print loop.
//! The one-shot CLI mode reuses the same session for a single turn.

pub mod commands;
pub mod display;
pub mod input;

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::agent::{AssistantOrchestrator, PromptSettings, TurnReport};
use crate::cli::{Config, Verbosity};
use crate::collaborators::{Collaborators, UserPrompt};
use crate::dispatch::IntentDispatcher;
use crate::resolve::{PendingChoice, Selection};
use crate::search::WebSearchClient;
use crate::session::{ProjectStore, SessionContext};
use crate::streaming::OllamaClient;
use crate::telemetry::TelemetryCollector;
use crate::tools::{LocalFilesystem, ShellRunner};
use crate::validation::SyntaxValidator;

pub use commands::{Command, ProjectCommand};
pub use display::DisplayManager;
pub use input::{InputEvent, InputHandler, TerminalPrompt};

/// Borrow the session's collaborators without borrowing the orchestrator
macro_rules! collaborators {
    ($session:expr) => {{
        let collab = Collaborators::new(
            &$session.client,
            &LocalFilesystem,
            &$session.prompt,
            &$session.runner,
        );
        match (&$session.search, $session.orchestrator.web_enabled()) {
            (Some(search), true) => collab.with_search(search),
            _ => collab,
        }
    }};
}

pub struct ReplSession {
    orchestrator: AssistantOrchestrator,
    client: OllamaClient,
    search: Option<WebSearchClient>,
    runner: ShellRunner,
    prompt: TerminalPrompt,
    projects: ProjectStore,
    display: DisplayManager,
    history_path: PathBuf,
}

impl ReplSession {
    /// Build a session rooted at `cwd` from the effective configuration
    pub fn from_config(config: &Config, cwd: PathBuf, verbosity: Verbosity) -> Result<Self> {
        let display = DisplayManager::new(
            verbosity.show_tokens(),
            verbosity.show_progress() && config.telemetry.show_spinner,
        );

        let mut client = OllamaClient::with_config(
            &config.ollama_url(),
            &config.ollama.default_model,
            config.ollama.request_timeout_secs,
        )
        .context("Failed to create Ollama client")?
        .with_token_sink(display.token_sink());
        if let Some(temperature) = config.ollama.temperature {
            client = client.with_temperature(temperature);
        }

        let search = if config.search.enabled {
            Some(
                WebSearchClient::new(config.search.searx_instances.clone(), config.search.timeout_secs)
                    .context("Failed to create web search client")?,
            )
        } else {
            None
        };

        let mut runner = ShellRunner::new(config.shell.timeout_secs);
        if let Some(launcher) = &config.shell.terminal_launcher {
            runner = runner.with_terminal_launcher(launcher.clone());
        }

        let prompt_settings = PromptSettings {
            python_command: config.shell.python_command.clone(),
            terminal_launcher: config.shell.terminal_launcher.clone(),
            web_enabled: config.search.enabled,
        };
        let dispatcher = IntentDispatcher::new(SyntaxValidator::new(), config.dispatch_settings());
        let orchestrator = AssistantOrchestrator::new(SessionContext::new(cwd), dispatcher, prompt_settings)
            .with_telemetry(TelemetryCollector::new());

        let mut session = Self {
            orchestrator,
            client,
            search,
            runner,
            prompt: TerminalPrompt::stdin(),
            projects: ProjectStore::new(config.projects_dir()),
            display,
            history_path: config.history_path(),
        };
        session.display.set_verbose(verbosity.show_events());
        Ok(session)
    }

    pub fn orchestrator(&self) -> &AssistantOrchestrator {
        &self.orchestrator
    }

    /// Run the interactive loop until `/exit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        let mut input = InputHandler::with_history(self.history_path.clone())?;
        let root = self.orchestrator.context().project_root().display().to_string();
        self.display.show_banner(
            env!("CARGO_PKG_VERSION"),
            &self.client.model(),
            &root,
            self.orchestrator.web_enabled(),
        );

        if !self.client.health_check().await {
            self.display.show_warning(&format!(
                "Ollama is not reachable at {}. Start it with `ollama serve`.",
                self.client.base_url()
            ));
        }

        loop {
            let line = match input.read_line()? {
                InputEvent::Line(line) => line,
                InputEvent::Interrupted => continue,
                InputEvent::Eof => break,
            };
            if line.is_empty() {
                continue;
            }

            if commands::is_command(&line) {
                if !self.execute(commands::parse(&line)).await {
                    break;
                }
            } else {
                self.turn(&line).await;
            }
        }

        if let Err(err) = input.save_history() {
            tracing::warn!(error = %err, "could not save input history");
        }
        println!("Goodbye!");
        Ok(())
    }

    /// Handle one request to the model; returns false if the model failed
    pub async fn turn(&mut self, line: &str) -> bool {
        self.display.start_thinking("Thinking...");
        let collab = collaborators!(self);
        let report = self.orchestrator.handle_user_message(line, &collab).await;
        self.display.stop_thinking();
        self.finish_turn(report).await
    }

    async fn finish_turn(&mut self, report: TurnReport) -> bool {
        self.display.show_turn(&report);
        let ok = report.halted().is_none();
        let pending: Vec<PendingChoice> = report.pending_choices().into_iter().cloned().collect();
        for choice in pending {
            self.settle(choice).await;
        }
        ok
    }

    /// Ask the user for a target and finish the suspended modification
    async fn settle(&mut self, pending: PendingChoice) {
        let selection = if pending.requires_new_path() {
            self.prompt.ask_text(&pending.prompt()).map(Selection::NewPath)
        } else {
            self.prompt
                .choose_one(&pending.prompt(), &pending.candidates)
                .map(Selection::Existing)
        };

        let Some(selection) = selection else {
            self.display.show_warning("No target chosen; modification skipped.");
            return;
        };

        let collab = collaborators!(self);
        let report = self.orchestrator.resume(&pending, selection, &collab).await;
        self.display.show_dispatch_report(&report);
    }

    /// Execute a built-in command; false means leave the loop
    pub async fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Help => print!("{}", commands::help_text()),
            Command::Exit => return false,
            Command::Clear => {
                self.orchestrator.clear();
                let _ = self.display.clear_screen();
                self.display.show_success("Conversation and loaded files cleared.");
            }
            Command::Load { path } => match self.orchestrator.load_path(&path) {
                Ok(loaded) => {
                    for (file, _) in &loaded.files {
                        self.display.show_bullet(file);
                    }
                    for skipped in &loaded.skipped {
                        self.display.show_warning(&format!("skipped {} (not text or too large)", skipped));
                    }
                    self.display.show_success(&format!("{} file(s) loaded.", loaded.files.len()));
                }
                Err(err) => self.display.show_error(&err.to_string()),
            },
            Command::Files => self.show_files(),
            Command::Web { query } => {
                if self.search.is_none() || !self.orchestrator.web_enabled() {
                    self.display.show_warning("Web search is disabled.");
                } else {
                    self.display.start_thinking("Searching the web...");
                    let collab = collaborators!(self);
                    let report = self.orchestrator.search_now(&query, &collab).await;
                    self.display.stop_thinking();
                    self.finish_turn(report).await;
                }
            }
            Command::Run { command } => {
                let collab = collaborators!(self);
                match self.orchestrator.run_user_command(&command, &collab).await {
                    Ok(output) => self.display.show_command_output(&output),
                    Err(err) => self.display.show_error(&err.to_string()),
                }
            }
            Command::Model { name: None } => self.list_models().await,
            Command::Model { name: Some(name) } => {
                self.client.set_model(&name);
                self.orchestrator.clear();
                self.display.show_success(&format!("Model switched to {}. Context cleared.", name));
            }
            Command::Project(project) => self.project(project),
            Command::Verbose { enable } => {
                let verbose = enable.unwrap_or(!self.display.verbose());
                self.display.set_verbose(verbose);
                self.display
                    .show_info(&format!("Verbose mode {}", if verbose { "on" } else { "off" }));
            }
            Command::Stats => self.show_stats(),
            Command::Usage { usage } => self.display.show_warning(&format!("Usage: {}", usage)),
            Command::Unknown { input } => self
                .display
                .show_error(&format!("Unknown command: {}. Type /help.", input)),
        }
        true
    }

    fn show_files(&self) {
        let ctx = self.orchestrator.context();
        if ctx.open_file_count() == 0 {
            self.display.show_info("No files loaded.");
            return;
        }
        self.display.show_section("Loaded files");
        for file in ctx.open_files() {
            self.display
                .show_bullet(&format!("{} ({} lines)", file.path, file.content.lines().count()));
        }
    }

    async fn list_models(&self) {
        match self.client.list_models().await {
            Ok(models) if models.is_empty() => self.display.show_info("No models installed."),
            Ok(models) => {
                let current = self.client.model();
                self.display.show_section("Available models");
                for (i, model) in models.iter().enumerate() {
                    let marker = if *model == current { " (current)" } else { "" };
                    self.display.show_numbered(i + 1, &format!("{}{}", model, marker));
                }
                self.display.show_info("Switch with /model <name>");
            }
            Err(err) => self.display.show_error(&err.to_string()),
        }
    }

    fn project(&mut self, command: ProjectCommand) {
        let result = match command {
            ProjectCommand::Save(name) => self
                .projects
                .save(&name, &self.client.model(), self.orchestrator.context())
                .map(|dir| format!("Project '{}' saved to {}", name, dir.display())),
            ProjectCommand::Load(name) => self.projects.load(&name).map(|project| {
                project.restore_into(self.orchestrator.context_mut());
                self.client.set_model(&project.metadata.model);
                for missing in &project.missing_files {
                    self.display.show_warning(&format!("saved copy of {} is missing", missing));
                }
                format!(
                    "Project '{}' loaded: {} file(s), {} message(s), model {}",
                    name,
                    project.files.len(),
                    project.history.len(),
                    project.metadata.model
                )
            }),
            ProjectCommand::List => self.projects.list().map(|projects| {
                if projects.is_empty() {
                    return "No saved projects.".to_string();
                }
                self.display.show_section("Saved projects");
                for project in &projects {
                    self.display.show_bullet(&format!(
                        "{} ({} files, {}, saved {})",
                        project.name,
                        project.files.len(),
                        project.model,
                        project.saved_at.format("%Y-%m-%d %H:%M")
                    ));
                }
                format!("{} project(s)", projects.len())
            }),
            ProjectCommand::Delete(name) => {
                if !self.prompt.confirm(&format!("Delete project '{}'? This cannot be undone.", name)) {
                    Ok("Deletion cancelled.".to_string())
                } else {
                    self.projects
                        .delete(&name)
                        .map(|_| format!("Project '{}' deleted.", name))
                }
            }
        };

        match result {
            Ok(message) => self.display.show_success(&message),
            Err(err) => self.display.show_error(&format!("{:#}", err)),
        }
    }

    fn show_stats(&self) {
        let ctx = self.orchestrator.context();
        self.display.show_section("Session statistics");
        print!("{}", self.orchestrator.telemetry().summary());
        println!("{:<20} {}", "Model", self.client.model());
        println!("{:<20} {}", "Loaded files", ctx.open_file_count());
        println!("{:<20} {}", "History messages", ctx.history().len());
        println!("{:<20} ~{}", "Context tokens", ctx.estimated_tokens());
    }
}
