//! Yahoo Finance quote client

use async_trait::async_trait;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::QuoteSource;
use crate::error::SourceError;
use crate::state::StockQuote;

const PROVIDER_LABEL: &str = "Yahoo Finance";

/// Yahoo Finance client (no API key required)
#[derive(Debug, Default)]
pub struct YahooQuoteClient {}

impl YahooQuoteClient {
    /// Create a new Yahoo Finance client
    pub fn new() -> Self {
        Self {}
    }

    fn connector() -> Result<yahoo::YahooConnector, SourceError> {
        yahoo::YahooConnector::new().map_err(|e| SourceError::UnexpectedResponse(e.to_string()))
    }

    /// Resolve a company name to its best-matching ticker symbol
    async fn resolve_ticker(
        &self,
        provider: &yahoo::YahooConnector,
        company: &str,
    ) -> Result<String, SourceError> {
        let result = provider
            .search_ticker(company)
            .await
            .map_err(|e| map_yahoo_error(&e))?;

        result
            .quotes
            .into_iter()
            .map(|item| item.symbol)
            .find(|symbol| !symbol.is_empty())
            .ok_or_else(|| SourceError::NotFound(format!("no ticker for {company}")))
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteClient {
    async fn fetch_quote(&self, company: &str) -> Result<StockQuote, SourceError> {
        let provider = Self::connector()?;
        let ticker = self.resolve_ticker(&provider, company).await?;
        debug!(company, ticker = %ticker, "Resolved ticker");

        let response = provider
            .get_latest_quotes(&ticker, "1d")
            .await
            .map_err(|e| map_yahoo_error(&e))?;

        let quote = response
            .last_quote()
            .map_err(|e| SourceError::NotFound(format!("no quote for {ticker}: {e}")))?;
        let currency = response
            .metadata()
            .ok()
            .and_then(|meta| currency_code(meta.currency));

        Ok(into_stock_quote(ticker, quote.open, quote.close, currency))
    }
}

fn into_stock_quote(ticker: String, open: f64, close: f64, currency: Option<String>) -> StockQuote {
    StockQuote {
        ticker,
        price: close,
        currency,
        change_percent: session_change(open, close),
        provider: PROVIDER_LABEL.to_string(),
    }
}

/// Normalize the chart metadata currency; blank codes count as absent
fn currency_code(raw: impl Into<Option<String>>) -> Option<String> {
    raw.into()
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty())
}

/// Percent change from the session open
fn session_change(open: f64, close: f64) -> Option<f64> {
    (open > 0.0 && close.is_finite()).then(|| ((close - open) / open * 100.0 * 100.0).round() / 100.0)
}

fn map_yahoo_error(error: &yahoo::YahooError) -> SourceError {
    let message = error.to_string();
    if message.contains("429") || message.to_ascii_lowercase().contains("too many requests") {
        SourceError::RateLimited(PROVIDER_LABEL.to_string())
    } else {
        SourceError::UnexpectedResponse(message)
    }
}
