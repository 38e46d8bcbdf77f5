//! Ordered fallback across quote providers

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::QuoteSource;
use crate::error::SourceError;
use crate::state::StockQuote;

/// Tries each provider in turn and returns the first quote found
///
/// When every provider fails, the last provider's error is returned.
pub struct QuoteChain {
    providers: Vec<Arc<dyn QuoteSource>>,
    link_timeout: Option<Duration>,
}

impl QuoteChain {
    pub fn new(first: Arc<dyn QuoteSource>) -> Self {
        Self {
            providers: vec![first],
            link_timeout: None,
        }
    }

    /// Provider tried after every earlier one has failed
    pub fn or(mut self, next: Arc<dyn QuoteSource>) -> Self {
        self.providers.push(next);
        self
    }

    /// Bound each provider separately so a stalled one leaves time for the next
    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = Some(timeout);
        self
    }

    async fn attempt(
        &self,
        provider: &dyn QuoteSource,
        company: &str,
    ) -> Result<StockQuote, SourceError> {
        match self.link_timeout {
            Some(limit) => tokio::time::timeout(limit, provider.fetch_quote(company))
                .await
                .unwrap_or(Err(SourceError::Timeout(limit))),
            None => provider.fetch_quote(company).await,
        }
    }
}

#[async_trait]
impl QuoteSource for QuoteChain {
    async fn fetch_quote(&self, company: &str) -> Result<StockQuote, SourceError> {
        let mut last_error = SourceError::NotFound(format!("no quote for {company}"));

        for (position, provider) in self.providers.iter().enumerate() {
            match self.attempt(provider.as_ref(), company).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    debug!(company, position, error = %e, "Quote provider failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
