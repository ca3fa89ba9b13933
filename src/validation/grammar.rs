//! Grammars backing the syntax validator
//!
//! A grammar only reports syntax problems; it never runs the source.

use super::python;
use super::types::{Diagnostic, SourceLanguage};
use std::collections::HashSet;

/// Maximum diagnostics reported for one check
pub const MAX_DIAGNOSTICS: usize = 10;

/// Pluggable syntax checker for one language
pub trait Grammar: Send + Sync {
    fn language(&self) -> SourceLanguage;

    /// Syntax problems in `source`; empty when well-formed
    fn check(&self, source: &str) -> Vec<Diagnostic>;
}

/// Grammar backed by a tree-sitter parser
pub struct TreeSitterGrammar {
    language: SourceLanguage,
    ts_language: tree_sitter::Language,
}

impl TreeSitterGrammar {
    pub fn python() -> Self {
        Self {
            language: SourceLanguage::Python,
            ts_language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    pub fn bash() -> Self {
        Self {
            language: SourceLanguage::Bash,
            ts_language: tree_sitter_bash::LANGUAGE.into(),
        }
    }
}

impl Grammar for TreeSitterGrammar {
    fn language(&self) -> SourceLanguage {
        self.language
    }

    fn check(&self, source: &str) -> Vec<Diagnostic> {
        // Parser is not Sync; one per check
        let mut parser = tree_sitter::Parser::new();
        if let Err(err) = parser.set_language(&self.ts_language) {
            return vec![Diagnostic::new(1, format!("{} grammar unavailable: {}", self.language, err))];
        }

        let Some(tree) = parser.parse(source, None) else {
            return vec![Diagnostic::new(1, "parser produced no syntax tree")];
        };

        let root = tree.root_node();
        let mut diagnostics = Vec::new();
        let mut seen = HashSet::new();

        if root.has_error() {
            let line_count = source.lines().count().max(1);
            collect_errors(root, source, line_count, &mut seen, &mut diagnostics);
            if diagnostics.is_empty() {
                diagnostics.push(Diagnostic::new(1, "syntax error"));
            }
        }

        if self.language == SourceLanguage::Python {
            for diagnostic in python::structural_diagnostics(root, source) {
                if diagnostics.len() >= MAX_DIAGNOSTICS {
                    break;
                }
                if seen.insert(diagnostic.clone()) {
                    diagnostics.push(diagnostic);
                }
            }
        }
        diagnostics
    }
}

fn collect_errors(
    node: tree_sitter::Node<'_>,
    source: &str,
    line_count: usize,
    seen: &mut HashSet<Diagnostic>,
    out: &mut Vec<Diagnostic>,
) {
    if out.len() >= MAX_DIAGNOSTICS {
        return;
    }

    if node.is_missing() || node.is_error() {
        // Errors at EOF sit on the row after the last line
        let line = (node.start_position().row + 1).min(line_count);
        let message = if node.is_missing() {
            format!("missing `{}`", node.kind())
        } else {
            describe_error(node, source)
        };
        let diagnostic = Diagnostic::new(line, message);
        if seen.insert(diagnostic.clone()) {
            out.push(diagnostic);
        }
        if node.is_missing() {
            return;
        }
    }

    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_errors(child, source, line_count, seen, out);
    }
}

fn describe_error(node: tree_sitter::Node<'_>, source: &str) -> String {
    let snippet = source
        .get(node.start_byte()..node.end_byte())
        .and_then(|text| text.lines().next())
        .map(str::trim)
        .unwrap_or("");

    if snippet.is_empty() {
        "unexpected end of input".to_string()
    } else {
        let shown: String = snippet.chars().take(40).collect();
        format!("invalid syntax near `{}`", shown)
    }
}
