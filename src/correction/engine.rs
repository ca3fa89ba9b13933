//! Bounded self-correction loop
//!
//! Drives one code artifact through the [`CorrectionState`] machine: check
//! it, and while it is malformed and attempts remain, send the failure back
//! to the model and re-parse the reply for a corrected version. The
//! correction exchange is appended to the conversation history.

use super::prompt::correction_prompt;
use super::state::{CorrectionEvent, CorrectionState, DEFAULT_MAX_ATTEMPTS};
use super::types::{CodeArtifact, CorrectionAttempt, CorrectionHistory, CorrectionOutcome};
use crate::collaborators::ModelCollaborator;
use crate::directives::{parse, Directive, WriteMode};
use crate::errors::Result;
use crate::session::SessionContext;
use crate::tools::patch::apply_patch;
use crate::types::ChatMessage;
use crate::validation::SyntaxValidator;

/// Self-correction driver bound to a validator
pub struct CorrectionLoop<'a> {
    validator: &'a SyntaxValidator,
    max_attempts: usize,
}

impl<'a> CorrectionLoop<'a> {
    pub fn new(validator: &'a SyntaxValidator, max_attempts: usize) -> Self {
        Self {
            validator,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_defaults(validator: &'a SyntaxValidator) -> Self {
        Self::new(validator, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run the loop until `Resolved` or `Exhausted`
    ///
    /// Only a model failure returns `Err`; the exchange cannot continue
    /// without a reply.
    pub async fn run(
        &self,
        artifact: CodeArtifact,
        ctx: &mut SessionContext,
        model: &dyn ModelCollaborator,
        system_prompt: &str,
    ) -> Result<CorrectionOutcome> {
        let mut history = CorrectionHistory::new();
        let mut current = artifact;
        let mut attempt = 0;
        let mut state = CorrectionState::Pending.transition(CorrectionEvent::Begin)?;

        loop {
            attempt += 1;
            let validation = self.validator.validate(&current.content, current.language);
            history.record(CorrectionAttempt {
                attempt_number: attempt,
                artifact: current.clone(),
                validation: validation.clone(),
            });

            if validation.ok {
                state = state.transition(CorrectionEvent::ValidationPassed)?;
                tracing::info!(path = %current.path, attempt, "artifact validated");
                return Ok(CorrectionOutcome {
                    state,
                    artifact: current,
                    history,
                });
            }

            state = state.transition(CorrectionEvent::ValidationFailed)?;
            tracing::warn!(
                path = %current.path,
                attempt,
                max_attempts = self.max_attempts,
                diagnostics = validation.diagnostics.len(),
                "syntax validation failed"
            );

            if attempt >= self.max_attempts {
                state = state.transition(CorrectionEvent::AttemptsExhausted)?;
                let best = history
                    .best()
                    .map(|a| a.artifact.clone())
                    .unwrap_or(current);
                return Ok(CorrectionOutcome {
                    state,
                    artifact: best,
                    history,
                });
            }

            ctx.push_message(ChatMessage::user(correction_prompt(&current, &validation)));
            let reply = model.complete(&ctx.model_messages(system_prompt)).await?;
            ctx.push_message(ChatMessage::assistant(reply.clone()));

            current = extract_correction(&reply, &current);
            state = state.transition(CorrectionEvent::CorrectionReceived)?;
        }
    }
}

/// Corrected artifact found in `reply`, or the previous one unchanged
///
/// Looks for a file modification aimed at the same path (or at no path),
/// then a scaffold entry with that path, then a bare fenced code block.
pub fn extract_correction(reply: &str, previous: &CodeArtifact) -> CodeArtifact {
    let output = parse(reply);

    for directive in &output.directives {
        match directive {
            Directive::FileModification(fm)
                if fm.path.as_deref().map_or(true, |p| same_path(p, &previous.path)) =>
            {
                let content = if fm.mode == WriteMode::Patch {
                    match apply_patch(&previous.content, &fm.content) {
                        Ok(patched) => patched,
                        Err(_) => continue,
                    }
                } else {
                    fm.content.clone()
                };
                return CodeArtifact::new(&previous.path, content, previous.language);
            }
            Directive::ProjectScaffold { entries } => {
                let found = entries
                    .iter()
                    .find(|e| !e.is_directory && same_path(&e.path, &previous.path));
                if let Some(content) = found.and_then(|e| e.content.as_ref()) {
                    return CodeArtifact::new(&previous.path, content.clone(), previous.language);
                }
            }
            _ => {}
        }
    }

    if let Some(block) = first_fenced_block(reply) {
        return CodeArtifact::new(&previous.path, block, previous.language);
    }

    tracing::debug!(path = %previous.path, "correction reply carried no usable content");
    previous.clone()
}

fn same_path(a: &str, b: &str) -> bool {
    let clean = |p: &str| p.trim().trim_start_matches("./").to_string();
    clean(a) == clean(b)
}

/// Inner text of the first ``` fenced block
fn first_fenced_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    let inner = body[..close].trim_end();
    (!inner.trim().is_empty()).then(|| inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use crate::validation::SourceLanguage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelCollaborator for Scripted {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::ModelUnavailable("script exhausted".into()))
        }
    }

    fn broken() -> CodeArtifact {
        CodeArtifact::new("app.py", "print(\"hi\"", SourceLanguage::Python)
    }

    #[tokio::test]
    async fn test_valid_artifact_needs_no_round_trip() {
        let validator = SyntaxValidator::new();
        let model = Scripted::new(&[]);
        let mut ctx = SessionContext::new(".");
        let artifact = CodeArtifact::new("ok.py", "x = 1\n", SourceLanguage::Python);

        let outcome = CorrectionLoop::with_defaults(&validator)
            .run(artifact, &mut ctx, &model, "sys")
            .await
            .unwrap();

        assert!(outcome.is_resolved());
        assert_eq!(outcome.round_trips(), 0);
        assert_eq!(model.calls(), 0);
        assert!(ctx.history().is_empty());
    }

    #[tokio::test]
    async fn test_one_round_trip_resolves() {
        let validator = SyntaxValidator::new();
        let model = Scripted::new(&[
            "Fixed:\n<file_modifications><file path=\"app.py\">print(\"hi\")</file></file_modifications>",
        ]);
        let mut ctx = SessionContext::new(".");

        let outcome = CorrectionLoop::with_defaults(&validator)
            .run(broken(), &mut ctx, &model, "sys")
            .await
            .unwrap();

        assert_eq!(outcome.state, CorrectionState::Resolved);
        assert_eq!(outcome.artifact.content, "print(\"hi\")");
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(model.calls(), 1);
        assert_eq!(ctx.history().len(), 2);
        assert!(ctx.history()[0].content.contains("print(\"hi\""));
    }

    #[tokio::test]
    async fn test_exhausts_within_bound() {
        let validator = SyntaxValidator::new();
        let still_broken =
            "<file_modifications><file path=\"app.py\">def (:</file></file_modifications>";
        let model = Scripted::new(&[still_broken, still_broken, still_broken, still_broken]);
        let mut ctx = SessionContext::new(".");

        let outcome = CorrectionLoop::new(&validator, 3)
            .run(broken(), &mut ctx, &model, "sys")
            .await
            .unwrap();

        assert_eq!(outcome.state, CorrectionState::Exhausted);
        assert_eq!(outcome.history.len(), 3);
        assert!(model.calls() <= 3);
        assert_eq!(model.calls(), 2);
        assert!(outcome.history.is_systemic_failure());
        assert!(outcome.summary().contains("still invalid"));
    }

    #[tokio::test]
    async fn test_single_attempt_budget_never_calls_model() {
        let validator = SyntaxValidator::new();
        let model = Scripted::new(&[]);
        let mut ctx = SessionContext::new(".");

        let outcome = CorrectionLoop::new(&validator, 1)
            .run(broken(), &mut ctx, &model, "sys")
            .await
            .unwrap();

        assert_eq!(outcome.state, CorrectionState::Exhausted);
        assert_eq!(model.calls(), 0);
        assert_eq!(outcome.artifact.content, "print(\"hi\"");
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let validator = SyntaxValidator::new();
        let model = Scripted::new(&[]);
        let mut ctx = SessionContext::new(".");

        let err = CorrectionLoop::with_defaults(&validator)
            .run(broken(), &mut ctx, &model, "sys")
            .await
            .unwrap_err();
        assert!(err.is_collaborator_unavailable());
    }

    #[test]
    fn test_extract_prefers_matching_path() {
        let reply = "<file_modifications>\
            <file path=\"other.py\">y = 2</file>\
            <file path=\"./app.py\">x = 1</file>\
            </file_modifications>";
        assert_eq!(extract_correction(reply, &broken()).content, "x = 1");
    }

    #[test]
    fn test_extract_applies_patch_to_previous() {
        let reply = "<file_modifications><file path=\"app.py\" action=\"patch\">\n\
            <<<<<<< SEARCH\nprint(\"hi\"\n=======\nprint(\"hi\")\n>>>>>>> REPLACE\n\
            </file></file_modifications>";
        assert_eq!(extract_correction(reply, &broken()).content, "print(\"hi\")");
    }

    #[test]
    fn test_extract_falls_back_to_fence_then_previous() {
        let fenced = "Here:\n```python\nprint(\"hi\")\n```\n";
        assert_eq!(extract_correction(fenced, &broken()).content, "print(\"hi\")");
        assert_eq!(extract_correction("sorry, no idea", &broken()), broken());
    }
}
