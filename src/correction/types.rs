//! Correction history and outcome types

use super::state::CorrectionState;
use crate::validation::{SourceLanguage, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source file under correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub path: String,
    pub content: String,
    pub language: SourceLanguage,
}

impl CodeArtifact {
    pub fn new(path: impl Into<String>, content: impl Into<String>, language: SourceLanguage) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language,
        }
    }
}

/// One validate step of the loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionAttempt {
    /// 1-based
    pub attempt_number: usize,
    pub artifact: CodeArtifact,
    pub validation: ValidationResult,
}

/// Ordered attempts of one code-producing exchange, bounded by the
/// configured maximum
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionHistory {
    attempts: Vec<CorrectionAttempt>,
}

impl CorrectionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, attempt: CorrectionAttempt) {
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[CorrectionAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn last(&self) -> Option<&CorrectionAttempt> {
        self.attempts.last()
    }

    /// Attempt with the fewest diagnostics; the latest wins ties
    pub fn best(&self) -> Option<&CorrectionAttempt> {
        self.attempts
            .iter()
            .rev()
            .min_by_key(|a| a.validation.diagnostics.len())
    }

    /// Lines reported as broken in more than one attempt
    pub fn recurring_lines(&self) -> Vec<usize> {
        let mut seen: HashMap<usize, usize> = HashMap::new();
        for attempt in &self.attempts {
            let mut lines: Vec<usize> = attempt.validation.diagnostics.iter().map(|d| d.line).collect();
            lines.sort_unstable();
            lines.dedup();
            for line in lines {
                *seen.entry(line).or_default() += 1;
            }
        }
        let mut recurring: Vec<usize> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(line, _)| line)
            .collect();
        recurring.sort_unstable();
        recurring
    }

    /// Every attempt failed and there was more than one
    pub fn is_systemic_failure(&self) -> bool {
        self.attempts.len() > 1 && self.attempts.iter().all(|a| !a.validation.ok)
    }
}

/// Final result of running the loop for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    /// `Resolved` or `Exhausted`
    pub state: CorrectionState,
    /// Valid content when resolved, best available content when exhausted
    pub artifact: CodeArtifact,
    pub history: CorrectionHistory,
}

impl CorrectionOutcome {
    pub fn is_resolved(&self) -> bool {
        self.state == CorrectionState::Resolved
    }

    /// Model round-trips spent on corrections
    pub fn round_trips(&self) -> usize {
        self.history.len().saturating_sub(1)
    }

    pub fn last_validation(&self) -> Option<&ValidationResult> {
        self.history.last().map(|a| &a.validation)
    }

    /// Short report for the user
    pub fn summary(&self) -> String {
        let path = &self.artifact.path;
        match self.state {
            CorrectionState::Resolved if self.round_trips() == 0 => {
                format!("{} passed syntax validation", path)
            }
            CorrectionState::Resolved => format!(
                "{} fixed after {} correction round-trip(s)",
                path,
                self.round_trips()
            ),
            _ => {
                let diagnostics = self
                    .last_validation()
                    .map(|v| v.render())
                    .unwrap_or_default();
                let pattern = if self.history.is_systemic_failure() {
                    let lines = self.history.recurring_lines();
                    if lines.is_empty() {
                        format!("all {} attempts failed", self.history.len())
                    } else {
                        format!(
                            "all {} attempts failed, repeatedly at line(s) {}",
                            self.history.len(),
                            lines.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(", ")
                        )
                    }
                } else {
                    "single failed attempt".to_string()
                };
                format!("{} is still invalid ({}):\n{}", path, pattern, diagnostics)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Diagnostic;

    fn attempt(n: usize, diagnostics: Vec<Diagnostic>) -> CorrectionAttempt {
        CorrectionAttempt {
            attempt_number: n,
            artifact: CodeArtifact::new("a.py", format!("v{}", n), SourceLanguage::Python),
            validation: ValidationResult::from_diagnostics(diagnostics),
        }
    }

    #[test]
    fn test_best_prefers_fewest_then_latest() {
        let mut history = CorrectionHistory::new();
        history.record(attempt(1, vec![Diagnostic::new(1, "a")]));
        history.record(attempt(2, vec![Diagnostic::new(1, "a"), Diagnostic::new(2, "b")]));
        history.record(attempt(3, vec![Diagnostic::new(4, "c")]));

        assert_eq!(history.best().unwrap().attempt_number, 3);
    }

    #[test]
    fn test_recurring_lines_and_systemic() {
        let mut history = CorrectionHistory::new();
        history.record(attempt(1, vec![Diagnostic::new(2, "a"), Diagnostic::new(5, "x")]));
        assert!(!history.is_systemic_failure());
        history.record(attempt(2, vec![Diagnostic::new(2, "b")]));

        assert!(history.is_systemic_failure());
        assert_eq!(history.recurring_lines(), vec![2]);
    }

    #[test]
    fn test_resolved_after_retry_is_not_systemic() {
        let mut history = CorrectionHistory::new();
        history.record(attempt(1, vec![Diagnostic::new(1, "a")]));
        history.record(attempt(2, vec![]));
        assert!(!history.is_systemic_failure());

        let outcome = CorrectionOutcome {
            state: CorrectionState::Resolved,
            artifact: history.last().unwrap().artifact.clone(),
            history,
        };
        assert_eq!(outcome.round_trips(), 1);
        assert!(outcome.summary().contains("1 correction"));
    }
}
