//! Correction state machine
//!
//! ```text
//! Pending    ─Begin─────────────▶ Validating
//! Validating ─ValidationPassed──▶ Resolved     (terminal)
//! Validating ─ValidationFailed──▶ Correcting
//! Correcting ─CorrectionReceived▶ Validating   (only while attempt < max)
//! Correcting ─AttemptsExhausted─▶ Exhausted    (terminal)
//! ```
//!
//! Each pass through `Validating` is one attempt and the attempt counter
//! never decreases, so at most `max_attempts - 1` corrections are requested
//! before the machine reaches a terminal state.

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};

/// Default maximum number of validation attempts
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrectionState {
    /// Code-bearing content seen, nothing checked yet
    Pending,
    Validating,
    /// Waiting for the model's corrected reply
    Correcting,
    /// Content is well-formed (terminal)
    Resolved,
    /// Attempts used up with content still malformed (terminal)
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionEvent {
    Begin,
    ValidationPassed,
    ValidationFailed,
    CorrectionReceived,
    AttemptsExhausted,
}

impl CorrectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CorrectionState::Resolved | CorrectionState::Exhausted)
    }

    pub fn transition(&self, event: CorrectionEvent) -> Result<CorrectionState> {
        use CorrectionEvent::*;
        use CorrectionState::*;

        let next = match (self, event) {
            (Pending, Begin) => Validating,
            (Validating, ValidationPassed) => Resolved,
            (Validating, ValidationFailed) => Correcting,
            (Correcting, CorrectionReceived) => Validating,
            (Correcting, AttemptsExhausted) => Exhausted,
            (from, event) => {
                return Err(AgentError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };
        Ok(next)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CorrectionState::Pending => "Pending",
            CorrectionState::Validating => "Validating",
            CorrectionState::Correcting => "Requesting correction",
            CorrectionState::Resolved => "Resolved",
            CorrectionState::Exhausted => "Attempts exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CorrectionEvent::*;
    use CorrectionState::*;

    #[test]
    fn test_valid_transitions() {
        assert_eq!(Pending.transition(Begin).unwrap(), Validating);
        assert_eq!(Validating.transition(ValidationPassed).unwrap(), Resolved);
        assert_eq!(Validating.transition(ValidationFailed).unwrap(), Correcting);
        assert_eq!(Correcting.transition(CorrectionReceived).unwrap(), Validating);
        assert_eq!(Correcting.transition(AttemptsExhausted).unwrap(), Exhausted);
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for state in [Resolved, Exhausted] {
            assert!(state.is_terminal());
            for event in [Begin, ValidationPassed, ValidationFailed, CorrectionReceived, AttemptsExhausted] {
                assert!(state.transition(event).is_err());
            }
        }
        assert!(!Pending.is_terminal());
        assert!(!Correcting.is_terminal());
    }

    #[test]
    fn test_invalid_shortcuts() {
        assert!(Pending.transition(ValidationPassed).is_err());
        assert!(Validating.transition(AttemptsExhausted).is_err());
        assert!(Correcting.transition(ValidationPassed).is_err());
    }
}
