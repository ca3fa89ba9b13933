//! Static syntax validation for generated source code

pub mod grammar;
mod python;
pub mod types;
pub mod validator;

pub use grammar::{Grammar, TreeSitterGrammar, MAX_DIAGNOSTICS};
pub use types::{Diagnostic, SourceLanguage, ValidationResult};
pub use validator::SyntaxValidator;
