//! Search intent handler
//!
//! ```text
//! handle(request):
//!   q ← optimize(request.raw_query)        one model call, raw query on failure
//!   hits ← search(q)                       unavailable backend is an error
//!   rank hits by term overlap with q, best first
//!   fetch pages of hits with relevance ≥ cutoff, at most max_pages,
//!     skipping failed fetches
//!   append bounded context block to history as a user message
//! ```

use super::types::{RankedHit, SearchHit, SearchResult, SearchSettings};
use crate::collaborators::{ModelCollaborator, SearchCollaborator};
use crate::directives::SearchRequest;
use crate::errors::{AgentError, Result};
use crate::session::SessionContext;
use crate::types::ChatMessage;
use std::cmp::Ordering;
use std::collections::HashSet;

const OPTIMIZER_SYSTEM_PROMPT: &str = "You are an expert at writing web search engine queries.";

/// Marker appended to truncated page text
const TRUNCATION_MARKER: &str = "\n[...]";

#[derive(Debug, Clone, Default)]
pub struct SearchIntentHandler {
    settings: SearchSettings,
}

impl SearchIntentHandler {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub async fn handle(
        &self,
        request: &SearchRequest,
        ctx: &mut SessionContext,
        model: &dyn ModelCollaborator,
        search: Option<&dyn SearchCollaborator>,
    ) -> Result<SearchResult> {
        let search = search
            .ok_or_else(|| AgentError::SearchUnavailable("web access is disabled".to_string()))?;

        let optimized = self.optimize_query(&request.raw_query, model).await;
        let mut request = request.clone();
        request.optimized_query = Some(optimized.clone());

        let hits = search
            .search(&optimized, self.settings.max_results)
            .await
            .map_err(|err| match err {
                AgentError::SearchUnavailable(_) => err,
                other => AgentError::SearchUnavailable(other.to_string()),
            })?;
        tracing::info!(query = %optimized, hits = hits.len(), "web search");

        if hits.is_empty() {
            return Ok(SearchResult {
                request,
                hits: Vec::new(),
                fetch_failures: Vec::new(),
                context_block: None,
            });
        }

        let terms = query_terms(&optimized);
        let mut ranked: Vec<RankedHit> = hits
            .into_iter()
            .map(|hit| RankedHit {
                relevance: relevance(&terms, &hit),
                hit,
                fetched: false,
            })
            .collect();
        ranked.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(Ordering::Equal));

        let mut pages: Vec<Option<String>> = vec![None; ranked.len()];
        let mut fetch_failures = Vec::new();
        let mut fetched = 0;
        for (idx, entry) in ranked.iter_mut().enumerate() {
            if fetched >= self.settings.max_pages {
                break;
            }
            if entry.relevance < self.settings.min_relevance {
                continue;
            }
            match search.fetch(&entry.hit.url).await {
                Ok(text) => {
                    pages[idx] = Some(truncate_chars(&text, self.settings.page_char_limit, TRUNCATION_MARKER));
                    entry.fetched = true;
                    fetched += 1;
                }
                Err(err) => {
                    tracing::debug!(url = %entry.hit.url, error = %err, "page fetch skipped");
                    fetch_failures.push((entry.hit.url.clone(), err.to_string()));
                }
            }
        }

        let block = self.build_context(&request, &ranked, &pages);
        ctx.push_message(ChatMessage::user(block.clone()));

        Ok(SearchResult {
            request,
            hits: ranked,
            fetch_failures,
            context_block: Some(block),
        })
    }

    /// Rewrite the user's query with one model call
    pub async fn optimize_query(&self, raw_query: &str, model: &dyn ModelCollaborator) -> String {
        let messages = [
            ChatMessage::system(OPTIMIZER_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Given the user's question, write one concise and effective search engine query \
                 to find the most relevant answer. Return only the query, without any explanation.\n\
                 User question: \"{}\"\nSearch query:",
                raw_query
            )),
        ];

        match model.complete(&messages).await {
            Ok(reply) => clean_query(&reply, raw_query, self.settings.max_query_chars),
            Err(err) => {
                tracing::debug!(error = %err, "query optimization failed, using raw query");
                raw_query.trim().to_string()
            }
        }
    }

    fn build_context(&self, request: &SearchRequest, ranked: &[RankedHit], pages: &[Option<String>]) -> String {
        let mut block = format!(
            "Web search results.\nUser question: {}\nSearch query: {}\n\n",
            request.raw_query,
            request.effective_query()
        );

        for (idx, entry) in ranked.iter().enumerate() {
            let n = idx + 1;
            block.push_str(&format!(
                "--- Source [{}] ---\nTitle: {}\nURL: {}\nSnippet: {}\n",
                n, entry.hit.title, entry.hit.url, entry.hit.snippet
            ));
            match pages.get(idx).and_then(|p| p.as_deref()) {
                Some(text) => block.push_str(&format!("Page content (excerpt):\n{}\n", text)),
                None => block.push_str("Page content: not loaded; rely on the title and snippet.\n"),
            }
            block.push_str(&format!("--- End of Source [{}] ---\n\n", n));
        }

        let instructions = "Answer the user's question from these sources. Cite them as [Source N]. \
             If they do not contain a direct answer, say what they do contain.";
        let budget = self
            .settings
            .context_char_limit
            .saturating_sub(instructions.chars().count() + 1);
        let mut block = truncate_chars(&block, budget, TRUNCATION_MARKER);
        block.push('\n');
        block.push_str(instructions);
        block
    }
}

/// Lowercased distinct terms of at least two characters
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Fraction of `terms` present in the hit's title or snippet
pub fn relevance(terms: &[String], hit: &SearchHit) -> f64 {
    if terms.is_empty() {
        return 1.0;
    }
    let haystack = format!("{} {}", hit.title, hit.snippet).to_lowercase();
    let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    matched as f64 / terms.len() as f64
}

fn clean_query(reply: &str, raw_query: &str, max_chars: usize) -> String {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let line = line
        .strip_prefix("Search query:")
        .unwrap_or(line)
        .replace(['"', '`'], "");
    let cleaned: String = line.trim().chars().take(max_chars).collect();

    if cleaned.is_empty() {
        raw_query.trim().to_string()
    } else {
        cleaned
    }
}

/// Cut `text` to at most `limit` characters, marking the cut
pub fn truncate_chars(text: &str, limit: usize, marker: &str) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(marker.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(marker);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok, block_on};

    struct FixedModel(Option<&'static str>);

    #[async_trait]
    impl ModelCollaborator for FixedModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| AgentError::ModelUnavailable("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct Backend {
        hits: Vec<SearchHit>,
        pages: HashMap<String, String>,
        queries: Mutex<Vec<String>>,
        fetched: Mutex<Vec<String>>,
    }

    impl Backend {
        fn hit(mut self, title: &str, url: &str, snippet: &str, page: Option<&str>) -> Self {
            self.hits.push(SearchHit::new(title, url, snippet));
            if let Some(page) = page {
                self.pages.insert(url.to_string(), page.to_string());
            }
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchCollaborator for Backend {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.hits.iter().take(max_results).cloned().collect())
        }

        async fn fetch(&self, url: &str) -> Result<String> {
            self.fetched.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| AgentError::Generic(format!("HTTP 404 for {}", url)))
        }
    }

    fn run(
        handler: &SearchIntentHandler,
        model: &FixedModel,
        backend: &Backend,
        query: &str,
    ) -> (SearchResult, SessionContext) {
        let mut ctx = SessionContext::new(".");
        let request = SearchRequest::new(query);
        let backend: &dyn SearchCollaborator = backend;
        let result = assert_ok!(block_on(handler.handle(&request, &mut ctx, model, Some(backend))));
        (result, ctx)
    }

    #[test]
    fn test_failed_fetch_is_skipped() {
        let backend = Backend::default()
            .hit("Tokio select", "https://a", "select macro", None)
            .hit("Select in tokio", "https://b", "branches", Some("select! polls branches"));
        let (result, _) = run(&SearchIntentHandler::default(), &FixedModel(Some("tokio select")), &backend, "q");

        assert_eq!(result.pages_fetched(), 1);
        assert_eq!(result.fetch_failures.len(), 1);
        assert_eq!(result.fetch_failures[0].0, "https://a");
        let block = result.context_block.unwrap();
        assert!(block.contains("select! polls branches"));
        assert!(block.contains("not loaded"));
    }

    #[test]
    fn test_irrelevant_hits_are_not_fetched() {
        let backend = Backend::default()
            .hit("Tokio select", "https://a", "macro", Some("docs"))
            .hit("Cooking", "https://pasta", "recipes", Some("boil water"));
        let (result, _) = run(&SearchIntentHandler::default(), &FixedModel(Some("tokio select")), &backend, "q");

        assert_eq!(backend.fetched(), vec!["https://a"]);
        assert!(result.hits.iter().any(|h| h.hit.url == "https://pasta" && !h.fetched));
    }

    #[test]
    fn test_page_fetches_are_capped() {
        let mut backend = Backend::default();
        for n in 0..5 {
            let url = format!("https://docs/{}", n);
            backend = backend.hit("Rust lifetimes", &url, "borrowing", Some("page"));
        }
        let handler = SearchIntentHandler::default();
        let (result, _) = run(&handler, &FixedModel(Some("rust lifetimes")), &backend, "q");

        assert_eq!(result.hits.len(), 5);
        assert_eq!(result.pages_fetched(), handler.settings().max_pages);
        assert_eq!(backend.fetched().len(), handler.settings().max_pages);
    }

    #[test]
    fn test_best_hits_are_fetched_first() {
        let backend = Backend::default()
            .hit("Tokio tutorial", "https://partial", "intro", Some("partial page"))
            .hit("select! in tokio", "https://full", "branches", Some("full page"));
        let handler = SearchIntentHandler::new(SearchSettings {
            max_pages: 1,
            ..SearchSettings::default()
        });
        let (result, _) = run(&handler, &FixedModel(Some("tokio select")), &backend, "q");

        assert_eq!(backend.fetched(), vec!["https://full"]);
        assert_eq!(result.hits[0].hit.url, "https://full");
        assert!(result.hits[0].relevance > result.hits[1].relevance);
        let block = result.context_block.unwrap();
        assert!(block.find("https://full").unwrap() < block.find("https://partial").unwrap());
    }

    #[test]
    fn test_optimizer_failure_uses_trimmed_raw_query() {
        let handler = SearchIntentHandler::default();
        let query = block_on(handler.optimize_query("  tokio select  ", &FixedModel(None)));
        assert_eq!(query, "tokio select");

        let backend = Backend::default();
        let (result, _) = run(&handler, &FixedModel(None), &backend, "  tokio select  ");
        assert_eq!(backend.queries.lock().unwrap().as_slice(), ["tokio select"]);
        assert!(result.context_block.is_none());
    }

    #[test]
    fn test_context_block_stays_within_limit() {
        let long_page = "tokio ".repeat(2000);
        let backend = Backend::default()
            .hit("Tokio", "https://a", "runtime", Some(&long_page))
            .hit("Tokio docs", "https://b", "runtime", Some(&long_page));
        let handler = SearchIntentHandler::new(SearchSettings {
            context_char_limit: 600,
            ..SearchSettings::default()
        });
        let (result, ctx) = run(&handler, &FixedModel(Some("tokio runtime")), &backend, "q");

        let block = result.context_block.unwrap();
        assert!(block.chars().count() <= 600);
        assert!(block.ends_with("say what they do contain."));
        assert_eq!(ctx.history().back().map(|m| m.content.as_str()), Some(block.as_str()));
    }

    #[test]
    fn test_missing_backend_is_an_error() {
        let handler = SearchIntentHandler::default();
        let mut ctx = SessionContext::new(".");
        let request = SearchRequest::new("anything");
        let err = assert_err!(block_on(handler.handle(&request, &mut ctx, &FixedModel(None), None)));
        assert!(matches!(err, AgentError::SearchUnavailable(_)));
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_query_terms() {
        assert_eq!(
            query_terms("Rust async, rust TOKIO a"),
            vec!["rust".to_string(), "async".to_string(), "tokio".to_string()]
        );
    }

    #[test]
    fn test_relevance_fraction() {
        let terms = query_terms("tokio select macro");
        let hit = SearchHit::new("The select! macro", "https://x", "in Tokio");
        assert!((relevance(&terms, &hit) - 1.0).abs() < f64::EPSILON);

        let unrelated = SearchHit::new("Cooking", "https://y", "pasta recipes");
        assert_eq!(relevance(&terms, &unrelated), 0.0);
        assert_eq!(relevance(&[], &unrelated), 1.0);
    }

    #[test]
    fn test_clean_query() {
        assert_eq!(clean_query("\n\"tokio tutorial\"\nextra", "raw", 200), "tokio tutorial");
        assert_eq!(clean_query("Search query: rust", "raw", 200), "rust");
        assert_eq!(clean_query("   ", "raw q", 200), "raw q");
        assert_eq!(clean_query("abcdef", "raw", 3), "abc");
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 10, "…"), "héllo");
        let cut = truncate_chars("ééééééééé", 5, "[.]");
        assert_eq!(cut.chars().count(), 5);
        assert!(cut.ends_with("[.]"));
    }
}
