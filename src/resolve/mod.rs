//! Target disambiguation for file modifications
//!
//! A modification without a path is resolved automatically when at most
//! one candidate exists and otherwise suspends as a [`PendingChoice`]. The
//! interactive loop asks the user and completes it with
//! [`DisambiguationResolver::select`].

use crate::directives::FileModification;
use crate::errors::{AgentError, Result};
use crate::session::SessionContext;
use serde::{Deserialize, Serialize};

/// Modification waiting for the user to name its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub directive: FileModification,
    /// Open files in insertion order; empty when a new name is required
    pub candidates: Vec<String>,
}

impl PendingChoice {
    /// No open files to pick from; the user must type a path
    pub fn requires_new_path(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn prompt(&self) -> String {
        if self.requires_new_path() {
            "No file is open. Which file should receive this content?".to_string()
        } else {
            "Several files are open. Which one should be modified?".to_string()
        }
    }
}

/// User answer to a pending choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Index into `PendingChoice::candidates`
    Existing(usize),
    NewPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(FileModification),
    NeedsUserChoice(PendingChoice),
}

#[derive(Debug, Clone, Default)]
pub struct DisambiguationResolver;

impl DisambiguationResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, fm: &FileModification, ctx: &SessionContext) -> Resolution {
        if fm.path.as_deref().map(|p| !p.trim().is_empty()).unwrap_or(false) {
            return Resolution::Resolved(fm.clone());
        }

        let candidates = ctx.open_paths();
        if candidates.len() == 1 {
            tracing::debug!(target_path = %candidates[0], "single open file chosen");
            return Resolution::Resolved(fm.with_path(&candidates[0]));
        }

        tracing::debug!(candidates = candidates.len(), "target needs user choice");
        Resolution::NeedsUserChoice(PendingChoice {
            directive: fm.clone(),
            candidates,
        })
    }

    /// Complete a pending choice
    pub fn select(&self, pending: &PendingChoice, selection: Selection) -> Result<FileModification> {
        match selection {
            Selection::Existing(index) => pending
                .candidates
                .get(index)
                .map(|path| pending.directive.with_path(path))
                .ok_or_else(|| AgentError::AmbiguityUnresolved {
                    reason: format!(
                        "selection {} is out of range for {} candidates",
                        index,
                        pending.candidates.len()
                    ),
                }),
            Selection::NewPath(path) => {
                let path = path.trim();
                if path.is_empty() {
                    return Err(AgentError::AmbiguityUnresolved {
                        reason: "no file name given".to_string(),
                    });
                }
                Ok(pending.directive.with_path(path))
            }
        }
    }
}
