//! Session state and saved projects
//!
//! - `context`: the open files and conversation history of the running session
//! - `persistence`: named project snapshots on disk

pub mod context;
pub mod persistence;

pub use context::{OpenFile, SessionContext, MAX_HISTORY_MESSAGES};
pub use persistence::{ProjectMetadata, ProjectStore, SavedProject};
