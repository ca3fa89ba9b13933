//! Search pipeline types

use crate::directives::SearchRequest;
use serde::{Deserialize, Serialize};

/// One result returned by the search backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// Hit with its relevance score and fetch status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub hit: SearchHit,
    /// Fraction of query terms found in title and snippet
    pub relevance: f64,
    /// Full page text was fetched and included
    pub fetched: bool,
}

/// Limits applied by the search handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub max_results: usize,
    pub max_pages: usize,
    pub min_relevance: f64,
    pub page_char_limit: usize,
    pub context_char_limit: usize,
    pub max_query_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            max_pages: 3,
            min_relevance: 0.2,
            page_char_limit: 4000,
            context_char_limit: 12_000,
            max_query_chars: 200,
        }
    }
}

/// Outcome of handling one search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Request with `optimized_query` filled in
    pub request: SearchRequest,
    pub hits: Vec<RankedHit>,
    /// URLs whose fetch failed, with the reason
    pub fetch_failures: Vec<(String, String)>,
    /// Context block appended to the conversation; `None` without hits
    pub context_block: Option<String>,
}

impl SearchResult {
    pub fn pages_fetched(&self) -> usize {
        self.hits.iter().filter(|h| h.fetched).count()
    }

    /// Whether anything was added to the conversation
    pub fn has_context(&self) -> bool {
        self.context_block.is_some()
    }
}
