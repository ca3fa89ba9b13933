//! Effects produced while dispatching directives

use crate::correction::CorrectionOutcome;
use crate::errors::AgentError;
use crate::resolve::PendingChoice;
use crate::search::SearchResult;
use crate::tools::{CommandOutput, MutationOutcome};

/// Observable result of handling one directive
#[derive(Debug, Clone)]
pub enum Effect {
    /// Narrative text to show as-is
    Display { text: String },
    /// Non-fatal problem to surface
    Warning { message: String },
    /// Mutation applied; one outcome per target
    Mutation {
        outcomes: Vec<MutationOutcome>,
        corrections: Vec<CorrectionOutcome>,
    },
    /// Code still malformed after all attempts and not applied
    Unresolved { correction: CorrectionOutcome },
    /// User declined a mutation or command
    Declined { description: String },
    /// Target must be chosen before the modification can proceed
    NeedsUserChoice(PendingChoice),
    Search(SearchResult),
    Shell(CommandOutput),
}

impl Effect {
    pub fn warning(message: impl Into<String>) -> Self {
        Effect::Warning {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Display { .. } => "display",
            Effect::Warning { .. } => "warning",
            Effect::Mutation { .. } => "mutation",
            Effect::Unresolved { .. } => "unresolved",
            Effect::Declined { .. } => "declined",
            Effect::NeedsUserChoice(_) => "needs_user_choice",
            Effect::Search(_) => "search",
            Effect::Shell(_) => "shell",
        }
    }
}

/// Everything that happened for one list of directives
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub effects: Vec<Effect>,
    /// Set when processing stopped early because the model was lost
    pub halted: Option<AgentError>,
}

impl DispatchReport {
    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn pending_choices(&self) -> Vec<&PendingChoice> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::NeedsUserChoice(pending) => Some(pending),
                _ => None,
            })
            .collect()
    }

    pub fn mutation_outcomes(&self) -> impl Iterator<Item = &MutationOutcome> {
        self.effects.iter().flat_map(|e| match e {
            Effect::Mutation { outcomes, .. } => &outcomes[..],
            _ => &[][..],
        })
    }

    pub fn corrections(&self) -> impl Iterator<Item = &CorrectionOutcome> {
        self.effects.iter().flat_map(|e| match e {
            Effect::Mutation { corrections, .. } => corrections.iter().collect::<Vec<_>>(),
            Effect::Unresolved { correction } => vec![correction],
            _ => Vec::new(),
        })
    }

    pub fn search_results(&self) -> impl Iterator<Item = &SearchResult> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Search(result) => Some(result),
            _ => None,
        })
    }

    pub fn shell_outputs(&self) -> impl Iterator<Item = &CommandOutput> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Shell(output) => Some(output),
            _ => None,
        })
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Append another report, keeping the first halt
    pub fn merge(&mut self, other: DispatchReport) {
        self.effects.extend(other.effects);
        if self.halted.is_none() {
            self.halted = other.halted;
        }
    }
}
