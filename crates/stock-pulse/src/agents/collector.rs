//! Data collector
//!
//! Runs the profile, news, quote and (when configured) website lookups
//! concurrently. A failing lookup is logged and recorded as a
//! [`SourceErrorTag`]; it never aborts the other lookups or the run.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::Step;
use crate::api::{NewsSource, ProfileSource, QuoteSource, WebsiteSource};
use crate::error::{Result, SourceError};
use crate::state::{DataSource, FailureKind, RawData, ResearchState, SourceErrorTag};

/// Data collector step
pub struct DataCollector {
    profiles: Arc<dyn ProfileSource>,
    news: Arc<dyn NewsSource>,
    /// `None` when quote lookups are disabled
    quotes: Option<Arc<dyn QuoteSource>>,
    websites: Option<Arc<dyn WebsiteSource>>,
    news_limit: usize,
    timeout: Duration,
}

impl DataCollector {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        news: Arc<dyn NewsSource>,
        quotes: Option<Arc<dyn QuoteSource>>,
    ) -> Self {
        Self {
            profiles,
            news,
            quotes,
            websites: None,
            news_limit: 5,
            timeout: Duration::from_secs(10),
        }
    }

    /// Keep at most `limit` news items; at least one is always requested
    pub fn with_news_limit(mut self, limit: usize) -> Self {
        self.news_limit = limit.max(1);
        self
    }

    /// Also look up the company's official website
    pub fn with_website_source(mut self, websites: Arc<dyn WebsiteSource>) -> Self {
        self.websites = Some(websites);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// News query for a company
    fn news_query(company: &str) -> String {
        format!("{company} stock")
    }

    /// Gather everything available about `company`
    pub async fn collect(&self, company: &str) -> RawData {
        let query = Self::news_query(company);

        let (profile, news, quote, website) = tokio::join!(
            bounded(self.timeout, self.profiles.fetch_profile(company)),
            bounded(self.timeout, self.news.search_news(&query, self.news_limit)),
            self.lookup_quote(company),
            self.lookup_website(company),
        );

        let mut raw = RawData::default();

        match profile {
            Ok(profile) => raw.profile_summary = Some(profile),
            Err(e) => record_failure(&mut raw, company, DataSource::Encyclopedia, &e),
        }

        match news {
            Ok(items) if items.is_empty() => {
                record_failure(
                    &mut raw,
                    company,
                    DataSource::News,
                    &SourceError::NotFound(query),
                );
            }
            Ok(mut items) => {
                items.truncate(self.news_limit);
                raw.news_items = items;
            }
            Err(e) => record_failure(&mut raw, company, DataSource::News, &e),
        }

        match quote {
            QuoteOutcome::Found(quote) => raw.stock_price = Some(quote),
            QuoteOutcome::Disabled => {
                raw.data_source_errors
                    .insert(SourceErrorTag::new(DataSource::StockQuote, FailureKind::Disabled));
            }
            QuoteOutcome::Failed(e) => {
                record_failure(&mut raw, company, DataSource::StockQuote, &e);
            }
        }

        match website {
            Some(Ok(url)) => raw.official_url = Some(url),
            Some(Err(e)) => record_failure(&mut raw, company, DataSource::Website, &e),
            None => {}
        }

        raw.finalize()
    }

    async fn lookup_quote(&self, company: &str) -> QuoteOutcome {
        let Some(quotes) = &self.quotes else {
            return QuoteOutcome::Disabled;
        };

        match bounded(self.timeout, quotes.fetch_quote(company)).await {
            Ok(quote) => QuoteOutcome::Found(quote),
            Err(e) => QuoteOutcome::Failed(e),
        }
    }

    async fn lookup_website(
        &self,
        company: &str,
    ) -> Option<std::result::Result<String, SourceError>> {
        let websites = self.websites.as_ref()?;
        Some(bounded(self.timeout, websites.find_official_site(company)).await)
    }
}

enum QuoteOutcome {
    Found(crate::state::StockQuote),
    Disabled,
    Failed(SourceError),
}

/// Run a lookup under the request timeout
async fn bounded<T, F>(timeout: Duration, lookup: F) -> std::result::Result<T, SourceError>
where
    F: Future<Output = std::result::Result<T, SourceError>>,
{
    tokio::time::timeout(timeout, lookup)
        .await
        .unwrap_or(Err(SourceError::Timeout(timeout)))
}

fn record_failure(raw: &mut RawData, company: &str, source: DataSource, error: &SourceError) {
    warn!(company, source = %source, error = %error, "Source lookup failed");
    raw.data_source_errors
        .insert(SourceErrorTag::from_error(source, error));
}

#[async_trait]
impl Step for DataCollector {
    async fn run(&self, state: ResearchState) -> Result<ResearchState> {
        let raw = self.collect(state.company_name()).await;

        info!(
            company = state.company_name(),
            quality = %raw.data_quality,
            news = raw.news_items.len(),
            failures = raw.data_source_errors.len(),
            "Data collection finished"
        );

        Ok(state.with_raw_data(raw))
    }

    fn name(&self) -> &'static str {
        "data_collector"
    }
}
