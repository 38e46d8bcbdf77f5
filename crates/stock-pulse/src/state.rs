//! The research state threaded through the workflow
//!
//! A [`ResearchState`] is created for one request, handed from step to step
//! by value, and returned to the caller once the workflow reaches its end.
//! Each field has a single writer:
//!
//! | field                                   | written by      |
//! |-----------------------------------------|-----------------|
//! | `company_name`                          | workflow start  |
//! | `raw_data`                              | data collector  |
//! | `validation_status`, `validation_reason`| validation gate |
//! | `analysis_results`                      | analyst         |
//!
//! Writers go through crate-private revision methods that consume the state
//! and return the next revision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::SourceError;

/// Encyclopedic profile of the company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Title of the article the summary came from
    pub title: String,
    /// Summary paragraph
    pub summary: String,
    /// Canonical article URL
    pub url: Option<String>,
}

/// One news search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub snippet: String,
    pub url: Option<String>,
    /// Publisher name
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Latest stock quote for the company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub ticker: String,
    pub price: f64,
    /// ISO currency code when the provider reports one
    pub currency: Option<String>,
    /// Percent change over the latest trading session
    pub change_percent: Option<f64>,
    /// Human-readable provider label, e.g. "Yahoo Finance"
    pub provider: String,
}

/// External source consulted by the data collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Encyclopedia,
    News,
    StockQuote,
    Website,
}

impl DataSource {
    /// Short label used in reasons and banners
    pub fn label(&self) -> &'static str {
        match self {
            Self::Encyclopedia => "encyclopedia profile",
            Self::News => "recent news",
            Self::StockQuote => "stock quote",
            Self::Website => "official website",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a sub-lookup produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    MissingCredential,
    Disabled,
    Timeout,
    Network,
    RateLimited,
    UnexpectedResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "not found",
            Self::MissingCredential => "no credential configured",
            Self::Disabled => "disabled",
            Self::Timeout => "timed out",
            Self::Network => "network error",
            Self::RateLimited => "rate limited",
            Self::UnexpectedResponse => "unexpected response",
        };
        f.write_str(text)
    }
}

/// Tag recording that one source failed during collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceErrorTag {
    pub source: DataSource,
    pub kind: FailureKind,
}

impl SourceErrorTag {
    pub fn new(source: DataSource, kind: FailureKind) -> Self {
        Self { source, kind }
    }

    /// Tag describing `error` for `source`
    pub fn from_error(source: DataSource, error: &SourceError) -> Self {
        Self::new(source, error.kind())
    }
}

/// Coarse quality score of the collected data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    #[default]
    Insufficient,
    Low,
    Medium,
    High,
}

impl DataQuality {
    /// Score the raw data: profile, news and price are worth two points
    /// each, three or more citations one more.
    pub fn assess(raw: &RawData) -> Self {
        let mut score = 0;
        if raw.profile_summary.is_some() {
            score += 2;
        }
        if !raw.news_items.is_empty() {
            score += 2;
        }
        if raw.stock_price.is_some() {
            score += 2;
        }
        if raw.sources.len() >= 3 {
            score += 1;
        }

        match score {
            5.. => Self::High,
            3..=4 => Self::Medium,
            1..=2 => Self::Low,
            _ => Self::Insufficient,
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Insufficient => "insufficient",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(text)
    }
}

/// Everything the data collector gathered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    pub profile_summary: Option<CompanyProfile>,
    /// Company homepage from a web search; not counted as a signal
    pub official_url: Option<String>,
    pub news_items: Vec<NewsItem>,
    pub stock_price: Option<StockQuote>,
    pub data_source_errors: BTreeSet<SourceErrorTag>,
    /// Citations, in collection order
    pub sources: Vec<String>,
    pub data_quality: DataQuality,
    pub collected_at: DateTime<Utc>,
}

impl Default for RawData {
    fn default() -> Self {
        Self {
            profile_summary: None,
            official_url: None,
            news_items: Vec::new(),
            stock_price: None,
            data_source_errors: BTreeSet::new(),
            sources: Vec::new(),
            data_quality: DataQuality::Insufficient,
            collected_at: Utc::now(),
        }
    }
}

impl RawData {
    /// True when no source produced anything
    pub fn is_empty(&self) -> bool {
        self.profile_summary.is_none() && self.news_items.is_empty() && self.stock_price.is_none()
    }

    /// Whether a failure was recorded for `source`
    pub fn failed(&self, source: DataSource) -> bool {
        self.data_source_errors.iter().any(|tag| tag.source == source)
    }

    /// Rebuild the citation list and quality score from the data fields
    pub(crate) fn finalize(mut self) -> Self {
        let mut sources = Vec::new();
        if let Some(profile) = &self.profile_summary {
            sources.push(format!(
                "Wikipedia: {}",
                profile.url.as_deref().unwrap_or("N/A")
            ));
        }
        sources.extend(
            self.news_items
                .iter()
                .take(3)
                .filter_map(|item| item.url.as_ref())
                .map(|url| format!("News: {url}")),
        );
        if let Some(url) = &self.official_url {
            sources.push(format!("Website: {url}"));
        }
        if let Some(quote) = &self.stock_price {
            sources.push(format!("Stock: {}", quote.provider));
        }
        self.sources = sources;
        self.data_quality = DataQuality::assess(&self);
        self
    }
}

/// Outcome of the validation gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

/// Investment recommendation produced by the analyst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
    InsufficientData,
}

impl Recommendation {
    /// Parse a free-form label as written by a model or an analyst note
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label
            .trim()
            .trim_matches(|c: char| c == '*' || c == '"' || c == '\'' || c == '.' || c == '!')
            .to_lowercase()
            .replace(['_', '-'], " ");

        match normalized.trim() {
            "buy" | "strong buy" | "accumulate" | "outperform" | "overweight" => Some(Self::Buy),
            "hold" | "neutral" | "maintain" | "market perform" => Some(Self::Hold),
            "sell" | "strong sell" | "reduce" | "underperform" | "underweight" | "avoid" => {
                Some(Self::Sell)
            }
            "insufficient data" | "insufficient" => Some(Self::InsufficientData),
            _ => None,
        }
    }

    /// Like [`Recommendation::from_label`], but also accepts a label
    /// followed by commentary, e.g. "BUY (high conviction)"
    pub fn from_text(text: &str) -> Option<Self> {
        Self::from_label(text).or_else(|| {
            let words: Vec<&str> = text
                .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
                .filter(|word| !word.is_empty())
                .take(2)
                .collect();
            (1..=words.len())
                .rev()
                .find_map(|n| Self::from_label(&words[..n].join(" ")))
        })
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
            Self::InsufficientData => "INSUFFICIENT DATA",
        };
        f.write_str(text)
    }
}

/// Structured output of the analyst step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub recommendation: Recommendation,
    pub summary_text: String,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    /// Model that produced the analysis, if one was called
    pub model: Option<String>,
    /// Set when the model output could not be parsed
    pub degraded: bool,
}

impl AnalysisResults {
    /// Result used when there is nothing to analyze
    pub fn insufficient(summary: impl Into<String>) -> Self {
        Self {
            recommendation: Recommendation::InsufficientData,
            summary_text: summary.into(),
            risks: Vec::new(),
            opportunities: Vec::new(),
            model: None,
            degraded: false,
        }
    }
}

/// Verdict of the validation gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: ValidationStatus,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn passed() -> Self {
        Self {
            status: ValidationStatus::Passed,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            reason: Some(reason.into()),
        }
    }
}

/// State of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub(crate) company_name: String,
    pub(crate) raw_data: RawData,
    pub(crate) validation_status: ValidationStatus,
    pub(crate) validation_reason: Option<String>,
    pub(crate) analysis_results: Option<AnalysisResults>,
}

impl ResearchState {
    /// Fresh state for a company name that has already been checked
    pub(crate) fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            raw_data: RawData::default(),
            validation_status: ValidationStatus::Pending,
            validation_reason: None,
            analysis_results: None,
        }
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn raw_data(&self) -> &RawData {
        &self.raw_data
    }

    pub fn validation_status(&self) -> ValidationStatus {
        self.validation_status
    }

    pub fn validation_reason(&self) -> Option<&str> {
        self.validation_reason.as_deref()
    }

    pub fn analysis_results(&self) -> Option<&AnalysisResults> {
        self.analysis_results.as_ref()
    }

    /// Revision written by the data collector
    pub(crate) fn with_raw_data(mut self, raw_data: RawData) -> Self {
        debug_assert_eq!(self.validation_status, ValidationStatus::Pending);
        self.raw_data = raw_data;
        self
    }

    /// Revision written by the validation gate
    pub(crate) fn with_verdict(mut self, verdict: Verdict) -> Self {
        debug_assert_eq!(self.validation_status, ValidationStatus::Pending);
        debug_assert_ne!(verdict.status, ValidationStatus::Pending);
        self.validation_status = verdict.status;
        self.validation_reason = verdict.reason;
        self
    }

    /// Revision written by the analyst
    pub(crate) fn with_analysis(mut self, results: AnalysisResults) -> Self {
        debug_assert_eq!(self.validation_status, ValidationStatus::Passed);
        self.analysis_results = Some(results);
        self
    }
}
