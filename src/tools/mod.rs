//! File mutation and shell execution
//!
//! - Path policy confining writes to the project root
//! - Mutation applier for file modifications and scaffolds
//! - SEARCH/REPLACE patches with unified diff previews
//! - Shell runner with timeout

pub mod applier;
pub mod filesystem;
pub mod patch;
pub mod process;
pub mod security;
pub mod types;

pub use applier::MutationApplier;
pub use filesystem::{load_text_files, LocalFilesystem, LoadedFiles};
pub use patch::{apply_patch, unified_diff};
pub use process::ShellRunner;
pub use security::PathPolicy;
pub use types::{CommandOutput, MutationKind, MutationOutcome};
