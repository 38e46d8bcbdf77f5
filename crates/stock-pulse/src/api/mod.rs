//! Clients for the external data sources
//!
//! The collector only sees the capability traits below, so any source can be
//! swapped for a different provider or a test double.

pub mod chain;
pub mod duckduckgo;
pub mod indian_api;
pub mod wikipedia;
pub mod yahoo;

pub use chain::QuoteChain;
pub use duckduckgo::DuckDuckGoClient;
pub use indian_api::IndianApiClient;
pub use wikipedia::WikipediaClient;
pub use yahoo::YahooQuoteClient;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::state::{CompanyProfile, NewsItem, StockQuote};

/// User agent sent to every HTTP source
pub(crate) const USER_AGENT: &str = concat!("stock-pulse/", env!("CARGO_PKG_VERSION"));

/// Encyclopedic lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Profile for the company, or [`SourceError::NotFound`]
    async fn fetch_profile(&self, company: &str) -> Result<CompanyProfile, SourceError>;
}

/// Web/news search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Up to `limit` recent items matching `query`, most relevant first
    async fn search_news(&self, query: &str, limit: usize) -> Result<Vec<NewsItem>, SourceError>;
}

/// Stock quote provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Resolve the company to a ticker and return its latest quote
    async fn fetch_quote(&self, company: &str) -> Result<StockQuote, SourceError>;
}

/// Official homepage lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebsiteSource: Send + Sync {
    /// URL of the company's own website, or [`SourceError::NotFound`]
    async fn find_official_site(&self, company: &str) -> Result<String, SourceError>;
}

/// Truncate to at most `max_chars` characters, on a char boundary
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}
