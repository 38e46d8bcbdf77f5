//! Research workflow
//!
//! A fixed graph of steps driven by an explicit transition table:
//!
//! ```text
//! Start -> Collect -> Validate -> Analyze -> End
//!                         \___________________/
//!                          validation failed
//! ```
//!
//! The only branch is after validation. Every node is visited at most once,
//! so a run always terminates.

use pulse_llm::LLMProvider;
use pulse_llm::providers::{GroqConfig, GroqProvider};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::agents::{Analyst, AnalystSettings, DataCollector, Step, ValidationGate};
use crate::api::{
    DuckDuckGoClient, IndianApiClient, QuoteChain, QuoteSource, WikipediaClient,
    YahooQuoteClient,
};
use crate::config::{PulseConfig, QuoteProvider};
use crate::error::{PulseError, Result};
use crate::state::{ResearchState, ValidationStatus};

/// Requests per minute allowed against DuckDuckGo
const SEARCH_RATE_LIMIT: u32 = 20;
/// Requests per minute allowed against IndianAPI
const INDIAN_API_RATE_LIMIT: u32 = 30;

/// Node of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Start,
    Collect,
    Validate,
    Analyze,
    End,
}

impl Node {
    const COUNT: usize = 5;
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Start => "start",
            Self::Collect => "collect",
            Self::Validate => "validate",
            Self::Analyze => "analyze",
            Self::End => "end",
        };
        f.write_str(text)
    }
}

/// Transition table of the workflow graph
pub fn next(node: Node, state: &ResearchState) -> Node {
    match node {
        Node::Start => Node::Collect,
        Node::Collect => Node::Validate,
        Node::Validate if state.validation_status() == ValidationStatus::Passed => Node::Analyze,
        Node::Validate | Node::Analyze | Node::End => Node::End,
    }
}

/// Check and normalize a caller-supplied company name
pub fn normalize_company_name(input: &str) -> Result<&str> {
    let name = input.trim();
    if name.is_empty() {
        return Err(PulseError::InvalidInput(
            "company name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

/// Runs the research workflow for one company at a time
pub struct Orchestrator {
    collector: Arc<dyn Step>,
    gate: Arc<dyn Step>,
    analyst: Arc<dyn Step>,
}

impl Orchestrator {
    /// Assemble an orchestrator from its three steps
    pub fn new(collector: Arc<dyn Step>, gate: Arc<dyn Step>, analyst: Arc<dyn Step>) -> Self {
        Self {
            collector,
            gate,
            analyst,
        }
    }

    /// Build the production pipeline: Wikipedia, DuckDuckGo, the configured
    /// quote provider and Groq
    pub fn from_config(config: &PulseConfig) -> Result<Self> {
        let api_key = config.groq_api_key.clone().ok_or_else(|| {
            PulseError::Config("GROQ_API_KEY is required to run the analyst".to_string())
        })?;
        let mut groq_config = GroqConfig::new(api_key).with_timeout(config.llm_timeout.as_secs());
        if let Some(base) = &config.groq_api_base {
            groq_config = groq_config.with_api_base(base.clone());
        }
        if let Some(fallback) = &config.fallback_model {
            groq_config = groq_config.with_fallback_model(fallback.clone());
        }
        let llm = GroqProvider::with_config(groq_config)?;

        Self::with_provider(config, Arc::new(llm))
    }

    /// Build the production sources around an already constructed provider
    pub fn with_provider(config: &PulseConfig, llm: Arc<dyn LLMProvider>) -> Result<Self> {
        config.validate()?;

        let timeout = config.request_timeout;
        let quotes: Option<Arc<dyn QuoteSource>> = match config.quote_provider {
            QuoteProvider::Yahoo => Some(Arc::new(YahooQuoteClient::new())),
            QuoteProvider::IndianApi => {
                let indian = IndianApiClient::new(
                    config.indian_api_key.clone(),
                    timeout / 2,
                    INDIAN_API_RATE_LIMIT,
                )?;
                // the collector bounds the whole chain by `timeout`
                let chain = QuoteChain::new(Arc::new(indian))
                    .or(Arc::new(YahooQuoteClient::new()))
                    .with_link_timeout(timeout / 2);
                Some(Arc::new(chain))
            }
            QuoteProvider::Disabled => None,
        };

        let search = Arc::new(DuckDuckGoClient::new(timeout, SEARCH_RATE_LIMIT)?);
        let collector = DataCollector::new(
            Arc::new(WikipediaClient::new(timeout)?),
            search.clone(),
            quotes,
        )
        .with_website_source(search)
        .with_news_limit(config.news_limit)
        .with_timeout(timeout);

        let gate = ValidationGate::new(config.sufficiency.clone())?;
        let analyst = Analyst::new(llm, AnalystSettings::from(config))?;

        Ok(Self::new(
            Arc::new(collector),
            Arc::new(gate),
            Arc::new(analyst),
        ))
    }

    fn step(&self, node: Node) -> Option<&dyn Step> {
        match node {
            Node::Collect => Some(self.collector.as_ref()),
            Node::Validate => Some(self.gate.as_ref()),
            Node::Analyze => Some(self.analyst.as_ref()),
            Node::Start | Node::End => None,
        }
    }

    /// Research `company_name` and return the terminal state
    ///
    /// Fails with [`PulseError::InvalidInput`] for blank names and with
    /// [`PulseError::ModelUnavailable`] when the analyst cannot reach the
    /// model. Source failures never fail the run.
    pub async fn run(&self, company_name: &str) -> Result<ResearchState> {
        let company = normalize_company_name(company_name)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("research", %run_id, company);

        self.drive(ResearchState::new(company)).instrument(span).await
    }

    async fn drive(&self, mut state: ResearchState) -> Result<ResearchState> {
        let mut node = Node::Start;

        for _ in 0..Node::COUNT {
            if let Some(step) = self.step(node) {
                debug!(step = step.name(), "Running step");
                state = step.run(state).await?;
            }

            let following = next(node, &state);
            info!(from = %node, to = %following, "Transition");
            if following == Node::End {
                break;
            }
            node = following;
        }

        debug_assert_ne!(state.validation_status(), ValidationStatus::Pending);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::SufficiencyRule;
    use crate::agents::analyst::tests::{JSON_REPLY, ScriptedLlm};
    use crate::api::{MockNewsSource, MockProfileSource, MockQuoteSource};
    use crate::error::SourceError;
    use crate::state::{
        CompanyProfile, DataSource, FailureKind, NewsItem, Recommendation, SourceErrorTag,
        StockQuote,
    };
    use chrono::{TimeZone, Utc};
    use pulse_llm::LLMError;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Clone, Copy)]
    struct Sources {
        profile: bool,
        news: bool,
        quote: bool,
    }

    fn profiles(found: bool) -> MockProfileSource {
        let mut mock = MockProfileSource::new();
        mock.expect_fetch_profile().returning(move |company| {
            if found {
                Ok(CompanyProfile {
                    title: format!("{company}, Inc."),
                    summary: format!("{company} designs and sells electric vehicles."),
                    url: Some("https://en.wikipedia.org/wiki/Tesla,_Inc.".to_string()),
                })
            } else {
                Err(SourceError::NotFound(company.to_string()))
            }
        });
        mock
    }

    fn news(found: bool) -> MockNewsSource {
        let mut mock = MockNewsSource::new();
        mock.expect_search_news().returning(move |query, limit| {
            if !found {
                return Ok(Vec::new());
            }
            Ok((0..limit.min(3))
                .map(|i| NewsItem {
                    title: format!("{query} headline {i}"),
                    snippet: "Shares moved.".to_string(),
                    url: Some(format!("https://news.example.com/{i}")),
                    source: Some("Reuters".to_string()),
                    published_at: None,
                })
                .collect())
        });
        mock
    }

    fn quotes(found: bool) -> MockQuoteSource {
        let mut mock = MockQuoteSource::new();
        mock.expect_fetch_quote().returning(move |company| {
            if found {
                Ok(StockQuote {
                    ticker: "TSLA".to_string(),
                    price: 251.3,
                    currency: Some("USD".to_string()),
                    change_percent: Some(-0.8),
                    provider: "Yahoo Finance".to_string(),
                })
            } else {
                Err(SourceError::NotFound(company.to_string()))
            }
        });
        mock
    }

    fn orchestrator(sources: Sources, llm: &Arc<ScriptedLlm>) -> Orchestrator {
        let collector = DataCollector::new(
            Arc::new(profiles(sources.profile)),
            Arc::new(news(sources.news)),
            Some(Arc::new(quotes(sources.quote))),
        );
        let analyst = Analyst::new(llm.clone(), AnalystSettings::default()).unwrap();

        Orchestrator::new(
            Arc::new(collector),
            Arc::new(ValidationGate::new(SufficiencyRule::default()).unwrap()),
            Arc::new(analyst),
        )
    }

    const ALL: Sources = Sources {
        profile: true,
        news: true,
        quote: true,
    };
    const NONE: Sources = Sources {
        profile: false,
        news: false,
        quote: false,
    };

    #[test]
    fn test_transition_table() {
        let pending = ResearchState::new("Tesla");
        assert_eq!(next(Node::Start, &pending), Node::Collect);
        assert_eq!(next(Node::Collect, &pending), Node::Validate);
        assert_eq!(next(Node::Analyze, &pending), Node::End);
        assert_eq!(next(Node::End, &pending), Node::End);

        let passed = pending.clone().with_verdict(crate::state::Verdict::passed());
        assert_eq!(next(Node::Validate, &passed), Node::Analyze);

        let failed = pending.with_verdict(crate::state::Verdict::failed("none"));
        assert_eq!(next(Node::Validate, &failed), Node::End);
    }

    #[test]
    fn test_normalize_company_name() {
        assert_eq!(normalize_company_name("  Tesla ").unwrap(), "Tesla");
        assert_err!(normalize_company_name(""));
        assert_err!(normalize_company_name(" \t\n"));
    }

    #[tokio::test]
    async fn test_scenario_known_company() {
        let llm = Arc::new(ScriptedLlm::replying(JSON_REPLY));
        let state = assert_ok!(orchestrator(ALL, &llm).run("Tesla").await);

        assert_eq!(state.company_name(), "Tesla");
        assert_eq!(state.validation_status(), ValidationStatus::Passed);
        assert!(state.validation_reason().is_none());
        assert!(state.raw_data().profile_summary.is_some());
        assert!(!state.raw_data().news_items.is_empty());
        assert!(state.raw_data().stock_price.is_some());

        let results = state.analysis_results().unwrap();
        assert_eq!(results.recommendation, Recommendation::Buy);
        assert!(!results.summary_text.is_empty());
        assert!(!results.risks.is_empty());
        assert!(!results.opportunities.is_empty());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scenario_unknown_company() {
        let llm = Arc::new(ScriptedLlm::replying(JSON_REPLY));
        let state = assert_ok!(
            orchestrator(NONE, &llm)
                .run("Xyzzyxnotarealcompany123")
                .await
        );

        assert_eq!(state.validation_status(), ValidationStatus::Failed);
        let reason = state.validation_reason().unwrap();
        assert!(reason.contains("Xyzzyxnotarealcompany123"));
        assert!(state.analysis_results().is_none());
        assert_eq!(llm.call_count(), 0);
        assert_eq!(state.raw_data().data_source_errors.len(), 3);
    }

    #[tokio::test]
    async fn test_scenario_empty_input() {
        let llm = Arc::new(ScriptedLlm::replying(JSON_REPLY));
        let orchestrator = orchestrator(ALL, &llm);

        for input in ["", "   "] {
            let err = orchestrator.run(input).await.unwrap_err();
            assert!(matches!(err, PulseError::InvalidInput(_)));
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_any_single_source_reaches_analyst_once() {
        let single = [
            Sources { profile: true, ..NONE },
            Sources { news: true, ..NONE },
            Sources { quote: true, ..NONE },
        ];

        for sources in single {
            let llm = Arc::new(ScriptedLlm::replying(JSON_REPLY));
            let state = orchestrator(sources, &llm).run("Tesla").await.unwrap();
            assert_eq!(state.validation_status(), ValidationStatus::Passed);
            assert!(state.analysis_results().is_some());
            assert_eq!(llm.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_branch_exclusivity() {
        for sources in [ALL, NONE] {
            let llm = Arc::new(ScriptedLlm::replying(JSON_REPLY));
            let state = orchestrator(sources, &llm).run("Tesla").await.unwrap();

            let passed = state.validation_status() == ValidationStatus::Passed;
            assert_ne!(state.validation_status(), ValidationStatus::Pending);
            assert_eq!(passed, state.analysis_results().is_some());
            assert_eq!(passed, state.validation_reason().is_none());
        }
    }

    #[tokio::test]
    async fn test_degraded_analysis_still_completes() {
        let llm = Arc::new(ScriptedLlm::replying("No structure here at all."));
        let state = orchestrator(ALL, &llm).run("Tesla").await.unwrap();

        let results = state.analysis_results().unwrap();
        assert!(results.degraded);
        assert_eq!(results.recommendation, Recommendation::InsufficientData);
        assert_eq!(results.summary_text, "No structure here at all.");
    }

    #[tokio::test]
    async fn test_model_failure_fails_the_run() {
        let llm = Arc::new(ScriptedLlm::failing(|| LLMError::AuthenticationFailed));
        let err = orchestrator(ALL, &llm).run("Tesla").await.unwrap_err();
        assert!(matches!(err, PulseError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_runs_are_idempotent_apart_from_timestamp() {
        let llm = Arc::new(ScriptedLlm::replying(JSON_REPLY));
        let orchestrator = orchestrator(Sources { quote: false, ..ALL }, &llm);

        let fixed = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut first = orchestrator.run("Tesla").await.unwrap();
        let mut second = orchestrator.run("Tesla").await.unwrap();
        first.raw_data.collected_at = fixed;
        second.raw_data.collected_at = fixed;

        assert_eq!(first, second);
        assert!(first.raw_data().data_source_errors.contains(&SourceErrorTag::new(
            DataSource::StockQuote,
            FailureKind::NotFound
        )));

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn test_with_provider_builds_every_quote_mode() {
        for provider in [QuoteProvider::Yahoo, QuoteProvider::IndianApi, QuoteProvider::Disabled] {
            let config = PulseConfig::builder()
                .quote_provider(provider)
                .request_timeout(Duration::from_secs(1))
                .build()
                .unwrap();
            let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedLlm::replying(JSON_REPLY));
            assert_ok!(Orchestrator::with_provider(&config, llm));
        }
    }

    #[test]
    fn test_with_provider_rejects_invalid_config() {
        let mut config = PulseConfig::default();
        config.sufficiency = SufficiencyRule::at_least(0);
        let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedLlm::replying(JSON_REPLY));
        assert!(matches!(
            Orchestrator::with_provider(&config, llm.clone()),
            Err(PulseError::Config(_))
        ));

        let mut config = PulseConfig::default();
        config.news_limit = 0;
        assert!(matches!(
            Orchestrator::with_provider(&config, llm),
            Err(PulseError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_requires_groq_key() {
        let config = PulseConfig::default();
        assert!(matches!(
            Orchestrator::from_config(&config),
            Err(PulseError::Config(_))
        ));
    }
}
