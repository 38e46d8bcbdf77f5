//! IndianAPI client for NSE/BSE listed companies

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{QuoteSource, USER_AGENT};
use crate::error::{Result, SourceError};
use crate::state::StockQuote;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const BASE_URL: &str = "https://stock.indianapi.in/stock";
const PROVIDER_LABEL: &str = "IndianAPI";

/// IndianAPI client with rate limiting
///
/// Built without a key it still answers, with
/// [`SourceError::MissingCredential`] for every lookup.
pub struct IndianApiClient {
    client: Client,
    api_key: Option<String>,
    rate_limiter: SharedRateLimiter,
}

impl IndianApiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - IndianAPI key, if configured
    /// * `timeout` - Per-request timeout
    /// * `rate_limit` - Requests per minute
    pub fn new(api_key: Option<String>, timeout: Duration, rate_limit: u32) -> Result<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_key,
            rate_limiter,
        })
    }
}

#[async_trait]
impl QuoteSource for IndianApiClient {
    async fn fetch_quote(&self, company: &str) -> std::result::Result<StockQuote, SourceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SourceError::MissingCredential("INDIAN_API_KEY".to_string()));
        };

        self.rate_limiter.until_ready().await;
        debug!(company, "Fetching IndianAPI quote");

        let response = self
            .client
            .get(BASE_URL)
            .query(&[("name", company)])
            .header("x-api-key", api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(SourceError::NotFound(format!("{company} not listed")));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited(PROVIDER_LABEL.to_string()));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SourceError::MissingCredential(
                    "INDIAN_API_KEY rejected".to_string(),
                ));
            }
            status if !status.is_success() => {
                return Err(SourceError::UnexpectedResponse(format!(
                    "IndianAPI returned {status}"
                )));
            }
            _ => {}
        }

        let body: Value = serde_json::from_str(&response.text().await?)?;
        parse_quote(company, &body)
    }
}

/// Numbers arrive either as JSON numbers or as numeric strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Value for an exchange-keyed field, preferring NSE over BSE
fn exchange_value(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => map
            .get("NSE")
            .and_then(as_number)
            .or_else(|| map.get("BSE").and_then(as_number)),
        other => as_number(other),
    }
}

fn parse_quote(company: &str, body: &Value) -> std::result::Result<StockQuote, SourceError> {
    if let Some(error) = body.get("error") {
        return Err(SourceError::NotFound(format!("{company}: {error}")));
    }

    let price = body
        .get("currentPrice")
        .and_then(exchange_value)
        .ok_or_else(|| SourceError::NotFound(format!("no price for {company}")))?;

    let ticker = ["symbol", "tickerId", "companyName"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map_or_else(|| company.to_uppercase(), str::to_string);

    Ok(StockQuote {
        ticker,
        price,
        currency: Some("INR".to_string()),
        change_percent: body.get("percentChange").and_then(exchange_value),
        provider: PROVIDER_LABEL.to_string(),
    })
}
