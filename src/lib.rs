//! ollamacode - terminal coding assistant for local Ollama models
//!
//! The model answers in plain text with embedded tool tags. This crate turns
//! those replies into actions:
//!
//! - `directives`: tag parser producing an ordered list of directives
//! - `validation`: tree-sitter syntax checks for generated source
//! - `correction`: bounded self-correction loop over the model
//! - `resolve`: choosing a target when a modification names none
//! - `tools`: path policy, patching, writes and shell commands
//! - `search`: query optimization, web retrieval and context folding
//! - `dispatch`: ordered routing of directives to the above
//! - `agent`: the per-turn orchestrator that owns the session
//!
//! `streaming`, `repl`, `cli`, `session` and `telemetry` provide the Ollama
//! transport, the interactive terminal, configuration, saved projects and
//! logging around that core.

pub mod errors;
pub mod types;

pub mod collaborators;
pub mod correction;
pub mod directives;
pub mod dispatch;
pub mod resolve;
pub mod search;
pub mod session;
pub mod tools;
pub mod validation;

pub mod agent;
pub mod cli;
pub mod repl;
pub mod streaming;
pub mod telemetry;

pub use errors::{AgentError, Result};
