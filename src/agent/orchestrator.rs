//! Assistant orchestrator
//!
//! Owns the [`SessionContext`] and runs one user turn end to end:
//!
//! ```text
//! user message → history
//! system prompt + open files + history → model → reply → history
//! reply → DirectiveParser → warnings surfaced
//! no markup at all? → directives from fenced code blocks
//! directives → IntentDispatcher → effects
//! shell output → history
//! search context added? → one synthesis reply → parse → dispatch
//! ```
//!
//! A lost model ends the turn with the error in the report; the session
//! stays usable for the next turn.

use crate::agent::prompt::{system_prompt, PromptSettings};
use crate::collaborators::Collaborators;
use crate::directives::{fenced_block_directives, Directive, DirectiveParser, ParseWarning, SearchRequest};
use crate::dispatch::{DispatchReport, Effect, IntentDispatcher};
use crate::errors::{AgentError, Result};
use crate::resolve::{PendingChoice, Selection};
use crate::session::SessionContext;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::tools::{load_text_files, CommandOutput, LoadedFiles};
use crate::types::ChatMessage;
use std::time::Instant;

/// Everything that happened during one user turn
#[derive(Debug, Default)]
pub struct TurnReport {
    /// Raw model replies in order: the answer, then the synthesis if any
    pub replies: Vec<String>,
    pub parse_warnings: Vec<ParseWarning>,
    pub dispatch: DispatchReport,
}

impl TurnReport {
    pub fn effects(&self) -> &[Effect] {
        &self.dispatch.effects
    }

    pub fn pending_choices(&self) -> Vec<&PendingChoice> {
        self.dispatch.pending_choices()
    }

    pub fn halted(&self) -> Option<&AgentError> {
        self.dispatch.halted.as_ref()
    }
}

pub struct AssistantOrchestrator {
    ctx: SessionContext,
    dispatcher: IntentDispatcher,
    parser: DirectiveParser,
    prompt: PromptSettings,
    telemetry: TelemetryCollector,
}

impl AssistantOrchestrator {
    pub fn new(ctx: SessionContext, dispatcher: IntentDispatcher, prompt: PromptSettings) -> Self {
        Self {
            ctx,
            dispatcher,
            parser: DirectiveParser::new(),
            prompt,
            telemetry: TelemetryCollector::new(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.ctx
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn dispatcher_mut(&mut self) -> &mut IntentDispatcher {
        &mut self.dispatcher
    }

    pub fn web_enabled(&self) -> bool {
        self.prompt.web_enabled
    }

    pub fn set_web_enabled(&mut self, enabled: bool) {
        self.prompt.web_enabled = enabled;
    }

    pub fn system_prompt(&self) -> String {
        system_prompt(&self.prompt, &self.ctx.open_paths())
    }

    /// Run one user turn
    pub async fn handle_user_message(&mut self, input: &str, collab: &Collaborators<'_>) -> TurnReport {
        let mut report = TurnReport::default();
        self.ctx.push_message(ChatMessage::user(input));

        let reply = match self.request_reply(collab).await {
            Ok(reply) => reply,
            Err(err) => {
                report.dispatch.halted = Some(err);
                return report;
            }
        };

        report.replies.push(reply.clone());
        let dispatch = self.process_reply(&reply, &mut report, collab, true).await;
        report.dispatch.merge(dispatch);
        self.follow_up_search(&mut report, collab).await;
        report
    }

    /// Search the web for `query` outside a model reply, then synthesize
    pub async fn search_now(&mut self, query: &str, collab: &Collaborators<'_>) -> TurnReport {
        let mut report = TurnReport::default();
        self.ctx.push_message(ChatMessage::user(format!("Search the web for: {}", query)));
        let directive = Directive::SearchRequest(SearchRequest::new(query));
        let dispatch = self.dispatch(&[directive], collab).await;
        report.dispatch.merge(dispatch);
        self.follow_up_search(&mut report, collab).await;
        report
    }

    /// Finish a modification that waited for a target choice
    pub async fn resume(
        &mut self,
        pending: &PendingChoice,
        selection: Selection,
        collab: &Collaborators<'_>,
    ) -> DispatchReport {
        let prompt = self.system_prompt();
        let report = self
            .dispatcher
            .resume(pending, selection, &mut self.ctx, collab, &prompt)
            .await;
        self.record_effects(&report);
        report
    }

    /// Run a command typed by the user; its output joins the conversation
    pub async fn run_user_command(&mut self, command: &str, collab: &Collaborators<'_>) -> Result<CommandOutput> {
        let output = collab.runner.run(command, self.ctx.project_root()).await?;
        self.record_shell(&output);
        self.ctx.push_message(shell_message(&output));
        Ok(output)
    }

    /// Read a file or directory below the project root into context
    pub fn load_path(&mut self, target: &str) -> Result<LoadedFiles> {
        let loaded = load_text_files(self.ctx.project_root(), target)?;
        for (path, content) in &loaded.files {
            self.ctx.open_file(path.clone(), content.clone());
        }
        tracing::info!(target, files = loaded.files.len(), skipped = loaded.skipped.len(), "files loaded");
        Ok(loaded)
    }

    /// Forget history and open files
    pub fn clear(&mut self) {
        self.ctx.reset();
    }

    async fn request_reply(&mut self, collab: &Collaborators<'_>) -> Result<String> {
        let messages = self.ctx.model_messages(&self.system_prompt());
        let started = Instant::now();
        let result = collab.model.complete(&messages).await;
        self.telemetry.record(TelemetryEvent::ModelRequest {
            duration_ms: started.elapsed().as_millis() as u64,
            success: result.is_ok(),
            timestamp: Instant::now(),
        });
        let reply = result?;
        self.ctx.push_message(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }

    /// Parse and dispatch one reply; searches are skipped unless allowed
    async fn process_reply(
        &mut self,
        reply: &str,
        report: &mut TurnReport,
        collab: &Collaborators<'_>,
        allow_search: bool,
    ) -> DispatchReport {
        let mut parsed = self.parser.parse(reply);
        if parsed.actionable().next().is_none() && !parsed.has_warnings() {
            let recovered = fenced_block_directives(reply);
            if !recovered.is_empty() {
                tracing::info!(directives = recovered.len(), "reply without markup; using its code blocks");
                parsed.directives.extend(recovered);
            }
        }
        self.telemetry.record(TelemetryEvent::DirectivesParsed {
            directives: parsed.actionable().count(),
            warnings: parsed.warnings.len(),
            timestamp: Instant::now(),
        });
        for warning in &parsed.warnings {
            tracing::warn!(%warning, "malformed directive in reply");
        }
        report.parse_warnings.extend(parsed.warnings);

        let mut skipped = DispatchReport::default();
        let directives: Vec<Directive> = parsed
            .directives
            .into_iter()
            .filter(|d| {
                let keep = allow_search || !matches!(d, Directive::SearchRequest(_));
                if !keep {
                    skipped.push(Effect::warning("only one web search per turn; further search skipped"));
                }
                keep
            })
            .collect();

        let mut dispatch = self.dispatch(&directives, collab).await;
        dispatch.merge(skipped);
        dispatch
    }

    async fn dispatch(&mut self, directives: &[Directive], collab: &Collaborators<'_>) -> DispatchReport {
        let prompt = self.system_prompt();
        let report = self.dispatcher.dispatch(directives, &mut self.ctx, collab, &prompt).await;

        for output in report.shell_outputs() {
            self.ctx.push_message(shell_message(output));
        }
        self.record_effects(&report);
        report
    }

    /// At most one synthesis request per turn, after search context was added
    async fn follow_up_search(&mut self, report: &mut TurnReport, collab: &Collaborators<'_>) {
        if report.dispatch.is_halted() || !report.dispatch.search_results().any(|r| r.has_context()) {
            return;
        }

        let reply = match self.request_reply(collab).await {
            Ok(reply) => reply,
            Err(err) => {
                report.dispatch.halted = Some(err);
                return;
            }
        };
        report.replies.push(reply.clone());
        let dispatch = self.process_reply(&reply, report, collab, false).await;
        report.dispatch.merge(dispatch);
    }

    fn record_effects(&self, report: &DispatchReport) {
        let now = Instant::now();
        for outcome in report.mutation_outcomes() {
            self.telemetry.record(TelemetryEvent::Mutation {
                target: outcome.target.clone(),
                success: outcome.success,
                timestamp: now,
            });
        }
        for correction in report.corrections() {
            let failures = correction.history.attempts().iter().filter(|a| !a.validation.ok).count();
            for attempt in correction.history.attempts().iter().filter(|a| !a.validation.ok) {
                self.telemetry.record(TelemetryEvent::ValidationFailed {
                    path: attempt.artifact.path.clone(),
                    diagnostics: attempt.validation.diagnostics.len(),
                    timestamp: now,
                });
            }
            if failures > 0 {
                self.telemetry.record(TelemetryEvent::Correction {
                    path: correction.artifact.path.clone(),
                    round_trips: correction.round_trips(),
                    resolved: correction.is_resolved(),
                    timestamp: now,
                });
            }
        }
        for result in report.search_results() {
            self.telemetry.record(TelemetryEvent::Search {
                query: result.request.effective_query().to_string(),
                hits: result.hits.len(),
                pages_fetched: result.pages_fetched(),
                timestamp: now,
            });
        }
        for output in report.shell_outputs() {
            self.record_shell(output);
        }
    }

    fn record_shell(&self, output: &CommandOutput) {
        self.telemetry.record(TelemetryEvent::ShellCommand {
            command: output.command.clone(),
            success: output.success(),
            timestamp: Instant::now(),
        });
    }
}

/// History entry carrying a command's output back to the model
fn shell_message(output: &CommandOutput) -> ChatMessage {
    let status = if output.detached {
        "started in a separate terminal".to_string()
    } else if output.timed_out {
        "timed out".to_string()
    } else {
        match output.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    };
    ChatMessage::user(format!(
        "Output of `{}` ({}):\n{}",
        output.command,
        status,
        output.combined()
    ))
}
