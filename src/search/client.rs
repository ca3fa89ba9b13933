//! Web search backend: SearX JSON instances with a DuckDuckGo HTML fallback
//!
//! Pages are fetched with `reqwest` and flattened to text with `html2text`.

use super::types::SearchHit;
use crate::collaborators::SearchCollaborator;
use crate::errors::{AgentError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Public SearX instances tried in order
pub const DEFAULT_SEARX_INSTANCES: [&str; 4] = [
    "https://search.privacyguides.net",
    "https://searx.be",
    "https://search.sapti.me",
    "https://searx.tiekoetter.com",
];

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0 Safari/537.36";

/// Width used when rendering HTML to text
const TEXT_WIDTH: usize = 100;

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// HTTP search client
#[derive(Debug, Clone)]
pub struct WebSearchClient {
    http: reqwest::Client,
    searx_instances: Vec<String>,
    duckduckgo_url: String,
}

impl WebSearchClient {
    pub fn new(searx_instances: Vec<String>, timeout_seconds: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            searx_instances,
            duckduckgo_url: DUCKDUCKGO_HTML_URL.to_string(),
        })
    }

    pub fn with_default_instances(timeout_seconds: u64) -> Result<Self> {
        Self::new(
            DEFAULT_SEARX_INSTANCES.iter().map(|s| s.to_string()).collect(),
            timeout_seconds,
        )
    }

    async fn search_searx(&self, instance: &str, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search", instance.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("categories", "general")])
            .send()
            .await?
            .error_for_status()?;

        let body: SearxResponse = response.json().await?;
        Ok(body
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(max_results)
            .map(|r| SearchHit::new(r.title, r.url, r.content))
            .collect())
    }

    async fn search_duckduckgo(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let html = self
            .http
            .get(&self.duckduckgo_url)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_duckduckgo_html(&html, max_results))
    }
}

#[async_trait]
impl SearchCollaborator for WebSearchClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        for instance in &self.searx_instances {
            match self.search_searx(instance, query, max_results).await {
                Ok(hits) if !hits.is_empty() => {
                    tracing::debug!(%instance, hits = hits.len(), "searx results");
                    return Ok(hits);
                }
                Ok(_) => tracing::debug!(%instance, "searx returned no results"),
                Err(err) => tracing::debug!(%instance, error = %err, "searx instance failed"),
            }
        }

        self.search_duckduckgo(query, max_results)
            .await
            .map_err(|err| AgentError::SearchUnavailable(format!("all search backends failed: {}", err)))
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        html_to_text(&bytes)
    }
}

fn result_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*>(.*?)</a>"#).expect("valid result regex")
    })
}

fn snippet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
            .expect("valid snippet regex")
    })
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href="([^"]*)""#).expect("valid href regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

/// Extract results from a DuckDuckGo HTML results page
pub fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchHit> {
    let links: Vec<_> = result_link_re().captures_iter(html).collect();
    let mut hits = Vec::new();

    for (idx, caps) in links.iter().enumerate() {
        if hits.len() >= max_results {
            break;
        }
        let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(href) = href_re().captures(whole.as_str()).and_then(|c| c.get(1)) else {
            continue;
        };

        // Snippet lives between this result link and the next one
        let segment_end = links
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(html.len());
        let snippet = snippet_re()
            .captures(&html[whole.end()..segment_end])
            .and_then(|c| c.get(1))
            .map(|m| clean_fragment(m.as_str()))
            .unwrap_or_default();

        hits.push(SearchHit::new(
            clean_fragment(title.as_str()),
            decode_redirect(&decode_entities(href.as_str())),
            snippet,
        ));
    }
    hits
}

/// Unwrap DuckDuckGo `/l/?uddg=` redirect links
pub fn decode_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    match url::Url::parse(&absolute) {
        Ok(parsed) if parsed.path().starts_with("/l/") => parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
            .unwrap_or(absolute),
        _ => absolute,
    }
}

/// Render an HTML page to readable text
pub fn html_to_text(html: &[u8]) -> Result<String> {
    let rendered = html2text::from_read(html, TEXT_WIDTH)
        .map_err(|e| AgentError::Generic(format!("failed to render page: {}", e)))?;

    let mut out = String::with_capacity(rendered.len());
    for line in rendered.lines().map(str::trim).filter(|l| !l.is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

fn clean_fragment(fragment: &str) -> String {
    let stripped = tag_re().replace_all(fragment, "");
    decode_entities(stripped.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}
