//! Wikipedia REST client for company profiles

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{ProfileSource, USER_AGENT, truncate_chars};
use crate::error::{PulseError, Result, SourceError};
use crate::state::CompanyProfile;

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";
const MAX_SUMMARY_CHARS: usize = 800;

/// Page summary as returned by `/page/summary/{title}`
#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    page_type: String,
    title: String,
    #[serde(default)]
    extract: String,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: Option<String>,
}

/// Wikipedia client
pub struct WikipediaClient {
    client: Client,
    base_url: Url,
}

impl WikipediaClient {
    /// Create a new client against English Wikipedia
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| PulseError::Config(format!("bad Wikipedia URL: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Titles tried in order for a company name
    fn candidate_titles(company: &str) -> [String; 3] {
        [
            company.to_string(),
            format!("{company} company"),
            format!("{company} corporation"),
        ]
    }

    fn summary_url(&self, title: &str) -> std::result::Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::UnexpectedResponse("base URL cannot hold a path".into()))?
            .pop_if_empty()
            .push(&title.replace(' ', "_"));
        url.query_pairs_mut().append_pair("redirect", "true");
        Ok(url)
    }

    async fn fetch_summary(
        &self,
        title: &str,
    ) -> std::result::Result<CompanyProfile, SourceError> {
        let url = self.summary_url(title)?;
        debug!(%url, "Fetching Wikipedia summary");

        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound(title.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited("Wikipedia".to_string()));
            }
            status if !status.is_success() => {
                return Err(SourceError::UnexpectedResponse(format!(
                    "Wikipedia returned {status}"
                )));
            }
            _ => {}
        }

        let body = response.text().await?;
        let summary: PageSummary = serde_json::from_str(&body)?;
        profile_from_summary(summary).ok_or_else(|| SourceError::NotFound(title.to_string()))
    }
}

#[async_trait]
impl ProfileSource for WikipediaClient {
    async fn fetch_profile(
        &self,
        company: &str,
    ) -> std::result::Result<CompanyProfile, SourceError> {
        for title in Self::candidate_titles(company) {
            match self.fetch_summary(&title).await {
                Ok(profile) => return Ok(profile),
                Err(SourceError::NotFound(_)) => {
                    debug!(title = %title, "No usable Wikipedia page");
                }
                Err(e) => return Err(e),
            }
        }

        Err(SourceError::NotFound(format!("no Wikipedia article for {company}")))
    }
}

fn is_disambiguation(summary: &PageSummary) -> bool {
    summary.page_type == "disambiguation"
        || summary.extract.contains("may refer to")
        || summary.extract.contains("can refer to")
}

fn profile_from_summary(summary: PageSummary) -> Option<CompanyProfile> {
    if is_disambiguation(&summary) || summary.extract.trim().is_empty() {
        return None;
    }

    let url = summary
        .content_urls
        .and_then(|urls| urls.desktop)
        .and_then(|desktop| desktop.page);

    Some(CompanyProfile {
        title: summary.title,
        summary: truncate_chars(summary.extract.trim(), MAX_SUMMARY_CHARS),
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(json: serde_json::Value) -> PageSummary {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_candidate_titles() {
        let titles = WikipediaClient::candidate_titles("Tesla");
        assert_eq!(titles, ["Tesla", "Tesla company", "Tesla corporation"]);
    }

    #[test]
    fn test_summary_url_encodes_title() {
        let client = WikipediaClient::new(Duration::from_secs(5)).unwrap();
        let url = client.summary_url("AT&T Inc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/AT&T_Inc?redirect=true"
        );

        let url = client.summary_url("Tata/Sons").unwrap();
        assert!(url.path().ends_with("/Tata%2FSons"));
    }

    #[test]
    fn test_standard_page_becomes_profile() {
        let profile = profile_from_summary(summary(serde_json::json!({
            "type": "standard",
            "title": "Tesla, Inc.",
            "extract": "Tesla, Inc. is an American multinational automotive and clean energy company.",
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Tesla,_Inc."}}
        })))
        .unwrap();

        assert_eq!(profile.title, "Tesla, Inc.");
        assert!(profile.summary.starts_with("Tesla, Inc. is"));
        assert_eq!(
            profile.url.as_deref(),
            Some("https://en.wikipedia.org/wiki/Tesla,_Inc.")
        );
    }

    #[test]
    fn test_disambiguation_is_rejected() {
        assert!(profile_from_summary(summary(serde_json::json!({
            "type": "disambiguation",
            "title": "Mercury",
            "extract": "Mercury usually refers to a planet or an element."
        })))
        .is_none());

        assert!(profile_from_summary(summary(serde_json::json!({
            "type": "standard",
            "title": "Apex",
            "extract": "Apex may refer to: the highest point of something"
        })))
        .is_none());
    }

    #[test]
    fn test_long_extract_is_truncated() {
        let profile = profile_from_summary(summary(serde_json::json!({
            "type": "standard",
            "title": "Long",
            "extract": "x".repeat(2000)
        })))
        .unwrap();

        assert_eq!(profile.summary.chars().count(), MAX_SUMMARY_CHARS + 3);
        assert!(profile.url.is_none());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_profile_live() {
        let client = WikipediaClient::new(Duration::from_secs(10)).unwrap();
        let profile = client.fetch_profile("Microsoft").await.unwrap();
        assert!(profile.summary.contains("Microsoft"));
    }
}
