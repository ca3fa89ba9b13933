//! Directive extraction from model replies
//!
//! Turns raw model text into an ordered list of [`Directive`]s plus
//! recoverable [`ParseWarning`]s. Replies with no markup at all can still
//! carry intent in fenced code blocks; see [`fallback`].

pub mod fallback;
pub mod parser;
pub mod types;

pub use fallback::fenced_block_directives;
pub use parser::{parse, DirectiveParser};
pub use types::{
    Directive, FileModification, ParseOutput, ParseWarning, ScaffoldEntry, SearchRequest,
    WarningKind, WriteMode,
};
