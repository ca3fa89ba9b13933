//! Directive types produced by the parser
//!
//! A directive is one typed instruction recognized in a model reply. Text
//! that is not part of a recognized block is kept as `PlainNarrative`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a file modification is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Create,
    Overwrite,
    /// Body holds SEARCH/REPLACE hunks applied to the current content
    Patch,
}

impl WriteMode {
    /// Parse the `action` attribute value
    pub fn from_action(action: &str) -> Option<Self> {
        match action.trim().to_ascii_lowercase().as_str() {
            "create" | "new" => Some(WriteMode::Create),
            "overwrite" | "modify" | "replace" | "update" => Some(WriteMode::Overwrite),
            "patch" | "edit" => Some(WriteMode::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Create => "create",
            WriteMode::Overwrite => "overwrite",
            WriteMode::Patch => "patch",
        }
    }
}

/// Single-file write request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileModification {
    /// Target path relative to the project root; `None` when the model did
    /// not name one and the target must be resolved
    pub path: Option<String>,
    pub content: String,
    pub mode: WriteMode,
}

impl FileModification {
    pub fn new(path: impl Into<String>, content: impl Into<String>, mode: WriteMode) -> Self {
        Self {
            path: Some(path.into()),
            content: content.into(),
            mode,
        }
    }

    /// Copy of this modification aimed at `path`
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            content: self.content.clone(),
            mode: self.mode,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// One entry of a project scaffold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldEntry {
    pub path: String,
    pub is_directory: bool,
    /// File body; always `None` for directories
    pub content: Option<String>,
}

impl ScaffoldEntry {
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            content: None,
        }
    }

    pub fn file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            content: Some(content.into()),
        }
    }
}

/// Web search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub raw_query: String,
    pub optimized_query: Option<String>,
}

impl SearchRequest {
    pub fn new(raw_query: impl Into<String>) -> Self {
        Self {
            raw_query: raw_query.into(),
            optimized_query: None,
        }
    }

    /// Query that should be sent to the search backend
    pub fn effective_query(&self) -> &str {
        self.optimized_query.as_deref().unwrap_or(&self.raw_query)
    }
}

/// Classified instruction extracted from model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    FileModification(FileModification),
    ProjectScaffold { entries: Vec<ScaffoldEntry> },
    SearchRequest(SearchRequest),
    ShellCommand { command: String },
    PlainNarrative { text: String },
}

impl Directive {
    pub fn narrative(text: impl Into<String>) -> Self {
        Directive::PlainNarrative { text: text.into() }
    }

    /// Short label used in logs and telemetry
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::FileModification(_) => "file_modification",
            Directive::ProjectScaffold { .. } => "project_scaffold",
            Directive::SearchRequest(_) => "search_request",
            Directive::ShellCommand { .. } => "shell_command",
            Directive::PlainNarrative { .. } => "plain_narrative",
        }
    }

    /// Whether applying this directive changes files
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Directive::FileModification(_) | Directive::ProjectScaffold { .. }
        )
    }
}

/// Kind of recoverable problem found while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    MissingCloseMarker,
    MissingAttribute { attribute: String },
    InvalidAttribute { attribute: String, value: String },
    MalformedTag,
    EmptyBlock,
}

/// Recoverable parse problem; the offending span became narrative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// Byte offset of the block's open marker in the raw text
    pub offset: usize,
    pub tag: String,
    pub kind: WarningKind,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::MissingCloseMarker => {
                write!(f, "<{}> at byte {} has no closing marker", self.tag, self.offset)
            }
            WarningKind::MissingAttribute { attribute } => write!(
                f,
                "<{}> at byte {} is missing required attribute `{}`",
                self.tag, self.offset, attribute
            ),
            WarningKind::InvalidAttribute { attribute, value } => write!(
                f,
                "<{}> at byte {} has invalid {}=\"{}\"",
                self.tag, self.offset, attribute, value
            ),
            WarningKind::MalformedTag => {
                write!(f, "<{}> at byte {} could not be read", self.tag, self.offset)
            }
            WarningKind::EmptyBlock => {
                write!(f, "<{}> at byte {} has no usable content", self.tag, self.offset)
            }
        }
    }
}

/// Result of parsing one model reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutput {
    pub directives: Vec<Directive>,
    pub warnings: Vec<ParseWarning>,
}

impl ParseOutput {
    /// Warning flag for the caller to surface
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Directives other than narrative
    pub fn actionable(&self) -> impl Iterator<Item = &Directive> {
        self.directives
            .iter()
            .filter(|d| !matches!(d, Directive::PlainNarrative { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_mode_from_action() {
        assert_eq!(WriteMode::from_action("create"), Some(WriteMode::Create));
        assert_eq!(WriteMode::from_action(" Overwrite "), Some(WriteMode::Overwrite));
        assert_eq!(WriteMode::from_action("patch"), Some(WriteMode::Patch));
        assert_eq!(WriteMode::from_action("delete"), None);
    }

    #[test]
    fn test_search_effective_query() {
        let mut req = SearchRequest::new("rust async book");
        assert_eq!(req.effective_query(), "rust async book");

        req.optimized_query = Some("tokio tutorial".to_string());
        assert_eq!(req.effective_query(), "tokio tutorial");
    }

    #[test]
    fn test_directive_serialization_tag() {
        let d = Directive::FileModification(FileModification::new(
            "a.py",
            "x = 1",
            WriteMode::Create,
        ));
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"type\":\"file_modification\""));
        assert_eq!(d.kind(), "file_modification");
        assert!(d.is_mutation());
        assert!(!Directive::narrative("hi").is_mutation());
    }

    #[test]
    fn test_warning_display() {
        let w = ParseWarning {
            offset: 4,
            tag: "file".to_string(),
            kind: WarningKind::MissingAttribute {
                attribute: "path".to_string(),
            },
        };
        assert!(w.to_string().contains("path"));
        assert!(w.to_string().contains("<file>"));
    }
}
