//! Turn orchestration
//!
//! The orchestrator owns the session and runs each user turn through the
//! model, the directive parser and the dispatcher.

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{AssistantOrchestrator, TurnReport};
pub use prompt::{system_prompt, PromptSettings};
