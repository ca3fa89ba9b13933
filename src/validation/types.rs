//! Syntax validation type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Languages with a known source classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Python,
    Bash,
}

impl SourceLanguage {
    /// Classify a path by its extension
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" | "pyw" => Some(SourceLanguage::Python),
            "sh" | "bash" => Some(SourceLanguage::Bash),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "python",
            SourceLanguage::Bash => "bash",
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One syntax problem, 1-based line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Outcome of a syntax check
///
/// `diagnostics` is empty exactly when `ok` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            diagnostics: Vec::new(),
        }
    }

    /// Failed result; an empty diagnostic list gets a generic entry
    pub fn rejected(mut diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            diagnostics.push(Diagnostic::new(1, "syntax error"));
        }
        Self {
            ok: false,
            diagnostics,
        }
    }

    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            Self::accepted()
        } else {
            Self::rejected(diagnostics)
        }
    }

    /// One line per diagnostic, for prompts and display
    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
