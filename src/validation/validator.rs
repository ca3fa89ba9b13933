//! Syntax validator
//!
//! Holds a registry of grammars keyed by language. Content whose path maps
//! to a registered language is source code and must pass a check before it
//! is written; everything else bypasses validation.

use crate::validation::grammar::{Grammar, TreeSitterGrammar};
use crate::validation::types::{SourceLanguage, ValidationResult};
use std::collections::HashMap;
use std::time::Instant;

/// Static syntax checker
pub struct SyntaxValidator {
    grammars: HashMap<SourceLanguage, Box<dyn Grammar>>,
}

impl SyntaxValidator {
    /// Validator with the built-in Python and Bash grammars
    pub fn new() -> Self {
        let mut validator = Self::empty();
        validator.register(Box::new(TreeSitterGrammar::python()));
        validator.register(Box::new(TreeSitterGrammar::bash()));
        validator
    }

    /// Validator without grammars; nothing counts as source
    pub fn empty() -> Self {
        Self {
            grammars: HashMap::new(),
        }
    }

    /// Register a grammar, replacing any previous one for its language
    pub fn register(&mut self, grammar: Box<dyn Grammar>) {
        self.grammars.insert(grammar.language(), grammar);
    }

    pub fn supports(&self, language: SourceLanguage) -> bool {
        self.grammars.contains_key(&language)
    }

    /// Language of `path` when it is validated source code
    pub fn classify(&self, path: &str) -> Option<SourceLanguage> {
        SourceLanguage::from_path(path).filter(|lang| self.supports(*lang))
    }

    /// Check `source` against the grammar for `language`
    ///
    /// A language without a registered grammar is accepted unchecked.
    pub fn validate(&self, source: &str, language: SourceLanguage) -> ValidationResult {
        let Some(grammar) = self.grammars.get(&language) else {
            return ValidationResult::accepted();
        };

        let start = Instant::now();
        let result = ValidationResult::from_diagnostics(grammar.check(source));
        tracing::debug!(
            language = %language,
            ok = result.ok,
            diagnostics = result.diagnostics.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "syntax check"
        );
        result
    }

    /// Check content destined for `path`; `None` when it is not source
    pub fn validate_path(&self, path: &str, content: &str) -> Option<ValidationResult> {
        self.classify(path).map(|lang| self.validate(content, lang))
    }
}

impl Default for SyntaxValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyntaxValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<_> = self.grammars.keys().map(|l| l.name()).collect();
        languages.sort_unstable();
        f.debug_struct("SyntaxValidator")
            .field("languages", &languages)
            .finish()
    }
}
