//! DuckDuckGo search client
//!
//! News search is a two-step exchange: the HTML search page hands out a
//! `vqd` token, which must accompany the JSON news request. Website lookups
//! scrape the first organic hit from the HTML-only results page, whose links
//! point at a `/l/?uddg=<target>` redirect.

use async_trait::async_trait;
use chrono::DateTime;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{NewsSource, USER_AGENT, WebsiteSource, truncate_chars};
use crate::error::{Result, SourceError};
use crate::state::NewsItem;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const SEARCH_URL: &str = "https://duckduckgo.com/";
const NEWS_URL: &str = "https://duckduckgo.com/news.js";
const HTML_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const MAX_SNIPPET_CHARS: usize = 200;

static VQD_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"vqd=["']?([0-9-]+)"#).ok());
static TAG_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());
static RESULT_LINK_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"<a[^>]*class="result__a"[^>]*>"#).ok());
static HREF_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).ok());

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpt: String,
    url: Option<String>,
    source: Option<String>,
    /// Unix timestamp
    date: Option<i64>,
}

/// DuckDuckGo news and web search client with rate limiting
pub struct DuckDuckGoClient {
    client: Client,
    rate_limiter: SharedRateLimiter,
}

impl DuckDuckGoClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `timeout` - Per-request timeout
    /// * `rate_limit` - Requests per minute; a news search costs two, a
    ///   website lookup one
    pub fn new(timeout: Duration, rate_limit: u32) -> Result<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    async fn fetch_token(&self, query: &str) -> std::result::Result<String, SourceError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query)])
            .send()
            .await?;
        check_status(response.status())?;

        let body = response.text().await?;
        extract_vqd(&body).ok_or_else(|| {
            SourceError::UnexpectedResponse("DuckDuckGo search token missing".to_string())
        })
    }
}

#[async_trait]
impl NewsSource for DuckDuckGoClient {
    async fn search_news(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<NewsItem>, SourceError> {
        let vqd = self.fetch_token(query).await?;
        self.rate_limiter.until_ready().await;

        debug!(query, limit, "Searching DuckDuckGo news");
        let response = self
            .client
            .get(NEWS_URL)
            .query(&[
                ("l", "us-en"),
                ("o", "json"),
                ("noamp", "1"),
                ("q", query),
                ("vqd", vqd.as_str()),
                ("p", "-1"),
            ])
            .send()
            .await?;
        check_status(response.status())?;

        let body = response.text().await?;
        let parsed: NewsResponse = serde_json::from_str(&body)?;
        let items = into_news_items(parsed, limit);

        if items.is_empty() {
            return Err(SourceError::NotFound(format!("no news for '{query}'")));
        }
        Ok(items)
    }
}

#[async_trait]
impl WebsiteSource for DuckDuckGoClient {
    async fn find_official_site(&self, company: &str) -> std::result::Result<String, SourceError> {
        let query = format!("{company} official website");
        self.rate_limiter.until_ready().await;

        debug!(query = %query, "Searching DuckDuckGo for the official website");
        let response = self
            .client
            .get(HTML_SEARCH_URL)
            .query(&[("q", query.as_str())])
            .send()
            .await?;
        check_status(response.status())?;

        let body = response.text().await?;
        first_result_url(&body)
            .ok_or_else(|| SourceError::NotFound(format!("no website found for {company}")))
    }
}

fn check_status(status: StatusCode) -> std::result::Result<(), SourceError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN | StatusCode::ACCEPTED => {
            Err(SourceError::RateLimited("DuckDuckGo".to_string()))
        }
        s if s.is_success() => Ok(()),
        s => Err(SourceError::UnexpectedResponse(format!(
            "DuckDuckGo returned {s}"
        ))),
    }
}

fn extract_vqd(body: &str) -> Option<String> {
    VQD_PATTERN
        .as_ref()?
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Target of the first organic result on an HTML results page
fn first_result_url(body: &str) -> Option<String> {
    let links = RESULT_LINK_PATTERN.as_ref()?;
    let href = HREF_PATTERN.as_ref()?;

    links
        .find_iter(body)
        .filter_map(|tag| href.captures(tag.as_str())?.get(1))
        .find_map(|m| result_target(&m.as_str().replace("&amp;", "&")))
}

/// Unwrap the redirect around a result link; ads and other internal links
/// yield `None`
fn result_target(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    let internal = url
        .host_str()
        .is_some_and(|host| host == "duckduckgo.com" || host.ends_with(".duckduckgo.com"));
    if !internal {
        return Some(url.to_string());
    }
    if url.path() != "/l/" {
        return None;
    }

    url.query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, target)| target.into_owned())
        .filter(|target| target.starts_with("http"))
}

fn strip_tags(text: &str) -> String {
    let stripped = match TAG_PATTERN.as_ref() {
        Some(pattern) => pattern.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    stripped
        .replace("&amp;", "&")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
}

fn into_news_items(response: NewsResponse, limit: usize) -> Vec<NewsItem> {
    response
        .results
        .into_iter()
        .filter(|r| !r.title.trim().is_empty())
        .take(limit)
        .map(|r| NewsItem {
            title: strip_tags(r.title.trim()),
            snippet: truncate_chars(&strip_tags(r.excerpt.trim()), MAX_SNIPPET_CHARS),
            url: r.url,
            source: r.source,
            published_at: r.date.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_vqd() {
        let body = r#"<script>DDG.deep.initialize('/d.js?q=tesla&vqd="4-123456789012345678901234567890"&l=us-en');</script>"#;
        assert_eq!(
            extract_vqd(body).as_deref(),
            Some("4-123456789012345678901234567890")
        );
        assert_eq!(extract_vqd("vqd=4-42&kl=wt-wt").as_deref(), Some("4-42"));
        assert!(extract_vqd("<html>no token</html>").is_none());
    }

    #[test]
    fn test_news_items_are_cleaned_and_limited() {
        let response: NewsResponse = serde_json::from_value(serde_json::json!({
            "results": [
                {
                    "title": "Tesla shares <b>jump</b>",
                    "excerpt": "Shares of <b>Tesla</b> rose &amp; kept rising",
                    "url": "https://news.example.com/a",
                    "source": "Reuters",
                    "date": 1_700_000_000
                },
                {"title": "", "excerpt": "untitled", "url": "https://news.example.com/b"},
                {"title": "Second", "excerpt": "x".repeat(500), "url": "https://news.example.com/c"},
                {"title": "Third", "excerpt": "", "url": "https://news.example.com/d"}
            ]
        }))
        .unwrap();

        let items = into_news_items(response, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Tesla shares jump");
        assert_eq!(items[0].snippet, "Shares of Tesla rose & kept rising");
        assert_eq!(items[0].source.as_deref(), Some("Reuters"));
        assert_eq!(
            items[0].published_at.map(|d| d.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(items[1].title, "Second");
        assert_eq!(items[1].snippet.chars().count(), MAX_SNIPPET_CHARS + 3);
    }

    #[test]
    fn test_first_result_skips_ads() {
        let body = r#"
            <div class="result results_links result--ad">
              <a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_domain=cars.example&amp;u3=x">Ad</a>
            </div>
            <div class="result results_links">
              <h2 class="result__title">
                <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.tesla.com%2F&amp;rut=abc123">Tesla</a>
              </h2>
            </div>
            <div class="result results_links">
              <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FTesla&amp;rut=def">Tesla - Wikipedia</a>
            </div>"#;

        assert_eq!(first_result_url(body).as_deref(), Some("https://www.tesla.com/"));
    }

    #[test]
    fn test_result_target() {
        assert_eq!(
            result_target("https://www.infosys.com/about.html").as_deref(),
            Some("https://www.infosys.com/about.html")
        );
        assert_eq!(
            result_target("//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.tatamotors.com%2F&rut=1")
                .as_deref(),
            Some("https://www.tatamotors.com/")
        );
        assert!(result_target("//duckduckgo.com/l/?rut=1").is_none());
        assert!(result_target("/html/?q=next+page").is_none());
        assert!(first_result_url("<html>No results.</html>").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(SourceError::RateLimited(_))
        ));
        assert!(matches!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(SourceError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_search_news_live() {
        let client = DuckDuckGoClient::new(Duration::from_secs(10), 20).unwrap();
        let items = client.search_news("Microsoft stock", 5).await.unwrap();
        assert!(!items.is_empty());
        assert!(items.len() <= 5);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_find_official_site_live() {
        let client = DuckDuckGoClient::new(Duration::from_secs(10), 20).unwrap();
        let url = client.find_official_site("Microsoft").await.unwrap();
        assert!(url.contains("microsoft.com"));
    }
}
