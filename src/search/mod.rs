//! Web search: query optimization, retrieval and context folding

pub mod client;
pub mod handler;
pub mod types;

pub use client::{WebSearchClient, DEFAULT_SEARX_INSTANCES};
pub use handler::SearchIntentHandler;
pub use types::{RankedHit, SearchHit, SearchResult, SearchSettings};
