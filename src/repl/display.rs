//! Terminal output for the REPL
//!
//! Colored messages, a spinner while the model thinks, live token
//! streaming and rendering of dispatch effects.

use crate::agent::TurnReport;
use crate::correction::CorrectionOutcome;
use crate::dispatch::{DispatchReport, Effect};
use crate::search::SearchResult;
use crate::streaming::TokenSink;
use crate::tools::{CommandOutput, MutationKind, MutationOutcome};
use colored::*;
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// Color a unified diff line by line
pub fn colorize_diff(diff: &str) -> String {
    diff.lines()
        .map(|line| {
            let colored = if line.starts_with("+++") || line.starts_with("---") {
                line.bold().to_string()
            } else if line.starts_with('+') {
                line.green().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else if line.starts_with("@@") {
                line.cyan().to_string()
            } else {
                line.to_string()
            };
            colored + "\n"
        })
        .collect()
}

pub struct DisplayManager {
    spinner: Arc<Mutex<Option<ProgressBar>>>,
    /// Whether replies are printed token by token as they stream
    stream_tokens: bool,
    show_progress: bool,
    verbose: bool,
}

impl DisplayManager {
    pub fn new(stream_tokens: bool, show_progress: bool) -> Self {
        Self {
            spinner: Arc::new(Mutex::new(None)),
            stream_tokens,
            show_progress,
            verbose: false,
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn streams_tokens(&self) -> bool {
        self.stream_tokens
    }

    pub fn show_banner(&self, version: &str, model: &str, root: &str, web: bool) {
        let rule = "=".repeat(64);
        println!("\n{}", rule.cyan());
        println!("{}", format!("  ollamacode {} - terminal coding assistant", version).bold().cyan());
        println!(
            "{}",
            format!("  Model: {} | Web: {} | Root: {}", model, if web { "on" } else { "off" }, root).dimmed()
        );
        println!("{}\n", rule.cyan());
        println!("Type your request (or {} for commands, {} to quit)\n", "/help".green(), "/exit".green());
    }

    /// Start the spinner shown until the first token arrives
    pub fn start_thinking(&self, message: &str) {
        if !self.show_progress {
            return;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(TICK);
        if let Some(previous) = self.lock_spinner().replace(pb) {
            previous.finish_and_clear();
        }
    }

    pub fn stop_thinking(&self) {
        if let Some(pb) = self.lock_spinner().take() {
            pb.finish_and_clear();
        }
    }

    fn lock_spinner(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sink for the model client: clears the spinner, then prints tokens
    pub fn token_sink(&self) -> TokenSink {
        let spinner = Arc::clone(&self.spinner);
        let print = self.stream_tokens;
        Arc::new(move |token: &str| {
            let pending = spinner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(pb) = pending {
                pb.finish_and_clear();
            }
            if print {
                let mut out = io::stdout();
                let _ = write!(out, "{}", token);
                let _ = out.flush();
            }
        })
    }

    pub fn show_turn(&self, report: &TurnReport) {
        if self.stream_tokens && !report.replies.is_empty() {
            println!();
        }
        for warning in &report.parse_warnings {
            self.show_warning(&format!("ignored malformed block: {}", warning));
        }
        self.show_dispatch(report.effects());
        if let Some(err) = report.halted() {
            self.show_error(&err.to_string());
        }
    }

    pub fn show_dispatch_report(&self, report: &DispatchReport) {
        self.show_dispatch(&report.effects);
        if let Some(err) = &report.halted {
            self.show_error(&err.to_string());
        }
    }

    fn show_dispatch(&self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                // Narrative was already printed while streaming
                Effect::Display { text } if !self.stream_tokens => println!("\n{}\n", text),
                Effect::Display { .. } => {}
                Effect::Warning { message } => self.show_warning(message),
                Effect::Mutation { outcomes, corrections } => {
                    for correction in corrections {
                        self.show_correction(correction);
                    }
                    for outcome in outcomes {
                        self.show_mutation(outcome);
                    }
                }
                Effect::Unresolved { correction } => {
                    self.show_correction(correction);
                    self.show_error(&format!("{} was not written", correction.artifact.path));
                }
                Effect::Declined { description } => {
                    println!("{} {}", "skipped".yellow(), description.dimmed())
                }
                // Resolved interactively after the report is shown
                Effect::NeedsUserChoice(_) => {}
                Effect::Search(result) => self.show_search(result),
                Effect::Shell(output) => self.show_command_output(output),
            }
        }
    }

    fn show_mutation(&self, outcome: &MutationOutcome) {
        if outcome.success {
            let verb = match outcome.kind {
                Some(MutationKind::Created) => "created",
                Some(MutationKind::Overwritten) => "updated",
                Some(MutationKind::DirectoryCreated) => "mkdir",
                None => "done",
            };
            println!("{} {} {}", "✓".green(), verb.green(), outcome.target);
        } else {
            println!(
                "{} {} {}",
                "✗".red(),
                outcome.target.red(),
                outcome.error.as_deref().unwrap_or("failed").dimmed()
            );
        }
    }

    fn show_correction(&self, outcome: &CorrectionOutcome) {
        if outcome.round_trips() == 0 && outcome.is_resolved() {
            return;
        }
        let line = outcome.summary();
        if outcome.is_resolved() {
            println!("{} {}", "↻".cyan(), line.cyan());
        } else {
            println!("{} {}", "↻".yellow(), line.yellow());
        }
        if self.verbose {
            for attempt in outcome.history.attempts() {
                println!(
                    "    attempt {}: {}",
                    attempt.attempt_number,
                    attempt.validation.render().dimmed()
                );
            }
        }
    }

    fn show_search(&self, result: &SearchResult) {
        println!(
            "{} searched \"{}\": {} results, {} pages read",
            "⌕".cyan(),
            result.request.effective_query(),
            result.hits.len(),
            result.pages_fetched()
        );
        if self.verbose {
            for ranked in &result.hits {
                println!(
                    "    {:.2} {} {}",
                    ranked.relevance,
                    ranked.hit.title,
                    ranked.hit.url.dimmed()
                );
            }
            for (url, reason) in &result.fetch_failures {
                println!("    {} {} ({})", "fetch failed".yellow(), url, reason.dimmed());
            }
        }
    }

    pub fn show_command_output(&self, output: &CommandOutput) {
        let status = if output.detached {
            "started in a new terminal".cyan()
        } else if output.timed_out {
            "timed out".red()
        } else if output.success() {
            "ok".green()
        } else {
            format!("exit {}", output.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".into())).red()
        };
        println!("{} {} [{}]", "$".bold(), output.command.bold(), status);
        if !output.stdout.trim().is_empty() {
            println!("{}", output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            println!("{}", output.stderr.trim_end().red());
        }
    }

    pub fn show_error(&self, error: &str) {
        println!("{} {}", "Error:".red().bold(), error.red());
    }

    pub fn show_warning(&self, warning: &str) {
        println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    pub fn show_info(&self, info: &str) {
        println!("{} {}", "Info:".cyan(), info);
    }

    pub fn show_success(&self, message: &str) {
        println!("{} {}", "✓".green(), message.green());
    }

    pub fn show_section(&self, title: &str) {
        println!("\n{}", title.bold().cyan());
        println!("{}", "-".repeat(60).cyan());
    }

    pub fn show_bullet(&self, text: &str) {
        println!("  {} {}", "•".cyan(), text);
    }

    pub fn show_numbered(&self, index: usize, text: &str) {
        println!("  {}. {}", index.to_string().cyan(), text);
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_diff_keeps_lines() {
        colored::control::set_override(false);
        let diff = "--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new\n";
        assert_eq!(colorize_diff(diff), diff);
    }

    #[test]
    fn test_spinner_cleared_by_first_token() {
        let display = DisplayManager::new(false, true);
        display.start_thinking("Thinking");
        assert!(display.lock_spinner().is_some());

        let sink = display.token_sink();
        sink("hello");
        assert!(display.lock_spinner().is_none());
    }

    #[test]
    fn test_quiet_display_has_no_spinner() {
        let display = DisplayManager::new(false, false);
        display.start_thinking("Thinking");
        assert!(display.lock_spinner().is_none());
        display.stop_thinking();
    }

    #[test]
    fn test_verbose_toggle() {
        let mut display = DisplayManager::new(true, true);
        assert!(!display.verbose());
        display.set_verbose(true);
        assert!(display.verbose());
        assert!(display.streams_tokens());
    }
}
