//! Self-correction of malformed generated code

pub mod engine;
pub mod prompt;
pub mod state;
pub mod types;

pub use engine::{extract_correction, CorrectionLoop};
pub use prompt::correction_prompt;
pub use state::{CorrectionEvent, CorrectionState, DEFAULT_MAX_ATTEMPTS};
pub use types::{CodeArtifact, CorrectionAttempt, CorrectionHistory, CorrectionOutcome};
