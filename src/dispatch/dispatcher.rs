//! Intent dispatcher
//!
//! Routes directives, strictly in order, to display, the mutation path
//! (disambiguation, patch materialization, self-correction, confirmation,
//! write), the search handler or the shell runner. Failures become
//! effects; only a lost model stops the remaining directives.

use super::types::{DispatchReport, Effect};
use crate::collaborators::Collaborators;
use crate::correction::{CodeArtifact, CorrectionLoop, CorrectionOutcome, DEFAULT_MAX_ATTEMPTS};
use crate::directives::{Directive, FileModification, ScaffoldEntry};
use crate::errors::Result;
use crate::resolve::{DisambiguationResolver, PendingChoice, Resolution, Selection};
use crate::search::{SearchIntentHandler, SearchSettings};
use crate::session::SessionContext;
use crate::tools::{MutationApplier, MutationOutcome};
use crate::validation::SyntaxValidator;

/// Dispatcher behaviour switches
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_attempts: usize,
    /// Ask before every file mutation
    pub confirm_writes: bool,
    pub search: SearchSettings,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            confirm_writes: true,
            search: SearchSettings::default(),
        }
    }
}

/// Result of validating code before a write
enum Checked {
    /// Content to write, plus the correction record when it was source
    Ready(String, Option<CorrectionOutcome>),
    /// Exhausted and the user refused the best attempt
    Discarded(CorrectionOutcome),
}

pub struct IntentDispatcher {
    validator: SyntaxValidator,
    applier: MutationApplier,
    resolver: DisambiguationResolver,
    search: SearchIntentHandler,
    settings: DispatchSettings,
}

impl IntentDispatcher {
    pub fn new(validator: SyntaxValidator, settings: DispatchSettings) -> Self {
        Self {
            validator,
            applier: MutationApplier::new(),
            resolver: DisambiguationResolver::new(),
            search: SearchIntentHandler::new(settings.search.clone()),
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn set_confirm_writes(&mut self, confirm: bool) {
        self.settings.confirm_writes = confirm;
    }

    pub fn validator(&self) -> &SyntaxValidator {
        &self.validator
    }

    /// Handle `directives` in order
    pub async fn dispatch(
        &self,
        directives: &[Directive],
        ctx: &mut SessionContext,
        collab: &Collaborators<'_>,
        system_prompt: &str,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for directive in directives {
            tracing::debug!(kind = directive.kind(), "dispatching directive");
            let handled = match directive {
                Directive::PlainNarrative { text } => Ok(vec![Effect::Display { text: text.clone() }]),
                Directive::FileModification(fm) => match self.resolver.resolve(fm, ctx) {
                    Resolution::Resolved(fm) => self.modify(fm, ctx, collab, system_prompt).await,
                    Resolution::NeedsUserChoice(pending) => Ok(vec![Effect::NeedsUserChoice(pending)]),
                },
                Directive::ProjectScaffold { entries } => {
                    self.scaffold(entries, ctx, collab, system_prompt).await
                }
                Directive::SearchRequest(request) => {
                    let result = self
                        .search
                        .handle(request, ctx, collab.model, collab.search)
                        .await;
                    Ok(vec![match result {
                        Ok(result) => Effect::Search(result),
                        Err(err) => Effect::warning(format!(
                            "web search unavailable, continuing without web context: {}",
                            err
                        )),
                    }])
                }
                Directive::ShellCommand { command } => Ok(vec![self.shell(command, ctx, collab).await]),
            };

            match handled {
                Ok(effects) => report.effects.extend(effects),
                Err(err) => {
                    tracing::error!(error = %err, "dispatch halted");
                    report.halted = Some(err);
                    break;
                }
            }
        }

        report
    }

    /// Continue a modification suspended for a target choice
    pub async fn resume(
        &self,
        pending: &PendingChoice,
        selection: Selection,
        ctx: &mut SessionContext,
        collab: &Collaborators<'_>,
        system_prompt: &str,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let fm = match self.resolver.select(pending, selection) {
            Ok(fm) => fm,
            Err(err) => {
                report.push(Effect::warning(err.to_string()));
                return report;
            }
        };

        match self.modify(fm, ctx, collab, system_prompt).await {
            Ok(effects) => report.effects.extend(effects),
            Err(err) => report.halted = Some(err),
        }
        report
    }

    async fn modify(
        &self,
        fm: FileModification,
        ctx: &mut SessionContext,
        collab: &Collaborators<'_>,
        system_prompt: &str,
    ) -> Result<Vec<Effect>> {
        let path = fm.path.clone().unwrap_or_default();
        let materialized = match self.applier.materialize(&fm, ctx, collab.filesystem) {
            Ok(materialized) => materialized,
            Err(err) => {
                return Ok(vec![Effect::Mutation {
                    outcomes: vec![MutationOutcome::failure(&path, err.to_string())],
                    corrections: Vec::new(),
                }]);
            }
        };

        let (content, correction) = match self
            .check(&path, &materialized.content, ctx, collab, system_prompt)
            .await?
        {
            Checked::Ready(content, correction) => (content, correction),
            Checked::Discarded(correction) => return Ok(vec![Effect::Unresolved { correction }]),
        };

        let directive = Directive::FileModification(FileModification {
            content,
            ..materialized
        });
        if !self.confirm_write(&directive, &path, ctx, collab) {
            return Ok(vec![Effect::Declined {
                description: format!("changes to {}", path),
            }]);
        }

        let outcomes = self.applier.apply(&directive, ctx, collab.filesystem);
        Ok(vec![Effect::Mutation {
            outcomes,
            corrections: correction.into_iter().collect(),
        }])
    }

    async fn scaffold(
        &self,
        entries: &[ScaffoldEntry],
        ctx: &mut SessionContext,
        collab: &Collaborators<'_>,
        system_prompt: &str,
    ) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        let mut corrections = Vec::new();
        let mut accepted = Vec::with_capacity(entries.len());

        for entry in entries {
            let Some(content) = entry.content.as_deref().filter(|_| !entry.is_directory) else {
                accepted.push(entry.clone());
                continue;
            };
            match self.check(&entry.path, content, ctx, collab, system_prompt).await? {
                Checked::Ready(content, correction) => {
                    corrections.extend(correction);
                    accepted.push(ScaffoldEntry::file(&entry.path, content));
                }
                Checked::Discarded(correction) => effects.push(Effect::Unresolved { correction }),
            }
        }

        if accepted.is_empty() {
            return Ok(effects);
        }

        let description = format!("project scaffold ({} entries)", accepted.len());
        let directive = Directive::ProjectScaffold { entries: accepted };
        if !self.confirm_write(&directive, &description, ctx, collab) {
            effects.push(Effect::Declined { description });
            return Ok(effects);
        }

        let outcomes = self.applier.apply(&directive, ctx, collab.filesystem);
        effects.push(Effect::Mutation {
            outcomes,
            corrections,
        });
        Ok(effects)
    }

    /// Validate code-bearing content, correcting it through the model
    async fn check(
        &self,
        path: &str,
        content: &str,
        ctx: &mut SessionContext,
        collab: &Collaborators<'_>,
        system_prompt: &str,
    ) -> Result<Checked> {
        let Some(language) = self.validator.classify(path) else {
            return Ok(Checked::Ready(content.to_string(), None));
        };

        let artifact = CodeArtifact::new(path, content, language);
        let outcome = CorrectionLoop::new(&self.validator, self.settings.max_attempts)
            .run(artifact, ctx, collab.model, system_prompt)
            .await?;

        if outcome.is_resolved() {
            return Ok(Checked::Ready(outcome.artifact.content.clone(), Some(outcome)));
        }

        let question = format!(
            "{}\nApply the best available version of {} anyway?",
            outcome.summary(),
            path
        );
        if collab.prompt.confirm(&question) {
            tracing::warn!(%path, "applying content that failed validation after confirmation");
            Ok(Checked::Ready(outcome.artifact.content.clone(), Some(outcome)))
        } else {
            Ok(Checked::Discarded(outcome))
        }
    }

    fn confirm_write(
        &self,
        directive: &Directive,
        description: &str,
        ctx: &SessionContext,
        collab: &Collaborators<'_>,
    ) -> bool {
        if !self.settings.confirm_writes {
            return true;
        }
        let preview = self.applier.preview(directive, ctx, collab.filesystem);
        collab
            .prompt
            .confirm(&format!("{}\nApply {}?", preview.trim_end(), description))
    }

    async fn shell(&self, command: &str, ctx: &SessionContext, collab: &Collaborators<'_>) -> Effect {
        if !collab
            .prompt
            .confirm(&format!("The assistant wants to run:\n  {}\nRun this command?", command))
        {
            return Effect::Declined {
                description: format!("command `{}`", command),
            };
        }

        match collab.runner.run(command, ctx.project_root()).await {
            Ok(output) => Effect::Shell(output),
            Err(err) => Effect::warning(format!("command `{}` failed to start: {}", command, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CommandRunner, ModelCollaborator, UserPrompt};
    use crate::directives::{parse, WriteMode};
    use crate::errors::AgentError;
    use crate::tools::{CommandOutput, LocalFilesystem};
    use crate::types::ChatMessage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Scripted(Mutex<VecDeque<String>>);

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self(Mutex::new(replies.iter().map(|r| r.to_string()).collect()))
        }
    }

    #[async_trait]
    impl ModelCollaborator for Scripted {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::ModelUnavailable("connection refused".into()))
        }
    }

    struct Answer {
        confirm: bool,
        asked: Mutex<Vec<String>>,
    }

    impl Answer {
        fn always(confirm: bool) -> Self {
            Self {
                confirm,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl UserPrompt for Answer {
        fn confirm(&self, question: &str) -> bool {
            self.asked.lock().unwrap().push(question.to_string());
            self.confirm
        }

        fn choose_one(&self, _prompt: &str, _candidates: &[String]) -> Option<usize> {
            None
        }

        fn ask_text(&self, _prompt: &str) -> Option<String> {
            None
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl CommandRunner for Recorder {
        async fn run(&self, command: &str, _cwd: &Path) -> Result<CommandOutput> {
            self.0.lock().unwrap().push(command.to_string());
            Ok(CommandOutput::completed(
                command,
                "ok".to_string(),
                String::new(),
                Some(0),
                std::time::Duration::from_millis(1),
            ))
        }
    }

    fn dispatcher(confirm_writes: bool) -> IntentDispatcher {
        IntentDispatcher::new(
            SyntaxValidator::new(),
            DispatchSettings {
                confirm_writes,
                ..DispatchSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_narrative_and_write_in_order() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let model = Scripted::new(&[]);
        let prompt = Answer::always(true);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);

        let parsed = parse(
            "Here you go.\n<file_modifications><file path=\"notes.txt\">hello</file></file_modifications>\nDone.",
        );
        let report = dispatcher(false)
            .dispatch(&parsed.directives, &mut ctx, &collab, "sys")
            .await;

        let kinds: Vec<_> = report.effects.iter().map(Effect::kind).collect();
        assert_eq!(kinds, vec!["display", "mutation", "display"]);
        assert_eq!(std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "hello");
        assert_eq!(ctx.file("notes.txt"), Some("hello"));
        assert!(prompt.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declined_write_leaves_disk_untouched() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let model = Scripted::new(&[]);
        let prompt = Answer::always(false);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);

        let directive = Directive::FileModification(FileModification::new(
            "a.txt",
            "text",
            WriteMode::Create,
        ));
        let report = dispatcher(true)
            .dispatch(&[directive], &mut ctx, &collab, "sys")
            .await;

        assert_eq!(report.effects[0].kind(), "declined");
        assert!(!dir.path().join("a.txt").exists());
        assert!(prompt.asked.lock().unwrap()[0].contains("+text"));
    }

    #[tokio::test]
    async fn test_broken_python_is_corrected_before_write() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let model = Scripted::new(&[
            "<file_modifications><file path=\"app.py\">print(\"hi\")\n</file></file_modifications>",
        ]);
        let prompt = Answer::always(true);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);

        let directive = Directive::FileModification(FileModification::new(
            "app.py",
            "print(\"hi\"\n",
            WriteMode::Create,
        ));
        let report = dispatcher(false)
            .dispatch(&[directive], &mut ctx, &collab, "sys")
            .await;

        assert_eq!(report.corrections().count(), 1);
        assert!(report.corrections().all(|c| c.is_resolved()));
        let written = std::fs::read_to_string(dir.path().join("app.py")).unwrap();
        assert_eq!(written.trim_end(), "print(\"hi\")");
    }

    #[tokio::test]
    async fn test_exhausted_correction_declined_is_not_applied() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let still_broken = "<file_modifications><file path=\"app.py\">def (:</file></file_modifications>";
        let model = Scripted::new(&[still_broken, still_broken]);
        let prompt = Answer::always(false);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);

        let directive = Directive::FileModification(FileModification::new(
            "app.py",
            "def broken(:\n",
            WriteMode::Create,
        ));
        let report = dispatcher(false)
            .dispatch(&[directive], &mut ctx, &collab, "sys")
            .await;

        assert_eq!(report.effects.len(), 1);
        assert_eq!(report.effects[0].kind(), "unresolved");
        assert!(!dir.path().join("app.py").exists());
    }

    #[tokio::test]
    async fn test_ambiguous_target_suspends_then_resumes() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        ctx.open_file("a.txt", "a");
        ctx.open_file("b.txt", "b");
        let model = Scripted::new(&[]);
        let prompt = Answer::always(true);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);
        let dispatcher = dispatcher(false);

        let directive = Directive::FileModification(FileModification {
            path: None,
            content: "new b".to_string(),
            mode: WriteMode::Overwrite,
        });
        let report = dispatcher
            .dispatch(&[directive], &mut ctx, &collab, "sys")
            .await;
        let pending = report.pending_choices()[0].clone();
        assert_eq!(pending.candidates, vec!["a.txt", "b.txt"]);
        assert!(!dir.path().join("b.txt").exists());

        let resumed = dispatcher
            .resume(&pending, Selection::Existing(1), &mut ctx, &collab, "sys")
            .await;
        assert!(resumed.mutation_outcomes().all(|o| o.success));
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "new b");
        assert_eq!(ctx.file("a.txt"), Some("a"));
    }

    #[tokio::test]
    async fn test_missing_search_backend_degrades_to_warning() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let model = Scripted::new(&[]);
        let prompt = Answer::always(true);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);

        let directives = parse("<search>rust async traits</search>\nAfter.").directives;
        let report = dispatcher(false)
            .dispatch(&directives, &mut ctx, &collab, "sys")
            .await;

        assert!(!report.is_halted());
        assert_eq!(report.effects[0].kind(), "warning");
        assert_eq!(report.effects[1].kind(), "display");
    }

    #[tokio::test]
    async fn test_shell_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let model = Scripted::new(&[]);
        let runner = Recorder::default();

        let refuse = Answer::always(false);
        let collab = Collaborators::new(&model, &LocalFilesystem, &refuse, &runner);
        let directive = Directive::ShellCommand {
            command: "ls".to_string(),
        };
        let report = dispatcher(false)
            .dispatch(std::slice::from_ref(&directive), &mut ctx, &collab, "sys")
            .await;
        assert_eq!(report.effects[0].kind(), "declined");
        assert!(runner.0.lock().unwrap().is_empty());

        let accept = Answer::always(true);
        let collab = Collaborators::new(&model, &LocalFilesystem, &accept, &runner);
        let report = dispatcher(false)
            .dispatch(&[directive], &mut ctx, &collab, "sys")
            .await;
        assert_eq!(report.shell_outputs().count(), 1);
        assert_eq!(runner.0.lock().unwrap().as_slice(), ["ls"]);
    }

    #[tokio::test]
    async fn test_lost_model_halts_remaining_directives() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let model = Scripted::new(&[]);
        let prompt = Answer::always(true);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);

        let directives = vec![
            Directive::FileModification(FileModification::new("bad.py", "def (:", WriteMode::Create)),
            Directive::narrative("never shown"),
        ];
        let report = dispatcher(false)
            .dispatch(&directives, &mut ctx, &collab, "sys")
            .await;

        assert!(report.is_halted());
        assert!(report.effects.is_empty());
        assert!(!dir.path().join("bad.py").exists());
    }

    #[tokio::test]
    async fn test_scaffold_confirmation_counts_surviving_entries() {
        let dir = TempDir::new().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        let still_broken = "<file_modifications><file path=\"app/main.py\">def (:</file></file_modifications>";
        let model = Scripted::new(&[still_broken, still_broken]);
        let prompt = Answer::always(false);
        let runner = Recorder::default();
        let collab = Collaborators::new(&model, &LocalFilesystem, &prompt, &runner);

        let directive = Directive::ProjectScaffold {
            entries: vec![
                ScaffoldEntry::directory("app/"),
                ScaffoldEntry::file("app/README.md", "# app"),
                ScaffoldEntry::file("app/main.py", "def broken(:\n"),
            ],
        };
        let report = dispatcher(true)
            .dispatch(&[directive], &mut ctx, &collab, "sys")
            .await;

        let kinds: Vec<_> = report.effects.iter().map(Effect::kind).collect();
        assert_eq!(kinds, vec!["unresolved", "declined"]);
        assert!(matches!(
            &report.effects[1],
            Effect::Declined { description } if description == "project scaffold (2 entries)"
        ));
        assert!(prompt.asked.lock().unwrap().last().unwrap().contains("Apply project scaffold (2 entries)?"));
        assert!(!dir.path().join("app").exists());
    }
}
