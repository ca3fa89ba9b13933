//! Ordered routing of directives to their handlers

pub mod dispatcher;
pub mod types;

pub use dispatcher::{DispatchSettings, IntentDispatcher};
pub use types::{DispatchReport, Effect};
