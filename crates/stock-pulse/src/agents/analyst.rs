//! Analyst step
//!
//! Sends the collected data to the language model and turns the reply into
//! [`AnalysisResults`]. Unparseable replies degrade; an unavailable model
//! is fatal for the run.

use async_trait::async_trait;
use pulse_llm::{CompletionRequest, LLMError, LLMProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::Step;
use super::parsing::parse_analysis;
use crate::config::{DEFAULT_ANALYST_MODEL, PulseConfig};
use crate::error::{PulseError, Result};
use crate::prompts::{ANALYST_SYSTEM, AnalystPrompts};
use crate::state::{AnalysisResults, RawData, ResearchState};

/// Model parameters used by the analyst
#[derive(Debug, Clone, PartialEq)]
pub struct AnalystSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl Default for AnalystSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_ANALYST_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&PulseConfig> for AnalystSettings {
    fn from(config: &PulseConfig) -> Self {
        Self {
            model: config.analyst_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.llm_timeout,
        }
    }
}

/// Analyst step backed by an LLM provider
pub struct Analyst {
    llm: Arc<dyn LLMProvider>,
    prompts: AnalystPrompts,
    settings: AnalystSettings,
}

impl Analyst {
    pub fn new(llm: Arc<dyn LLMProvider>, settings: AnalystSettings) -> Result<Self> {
        let prompts = AnalystPrompts::new()
            .map_err(|e| PulseError::Config(format!("analyst prompt template: {e}")))?;

        Ok(Self {
            llm,
            prompts,
            settings,
        })
    }

    /// Analyze the data collected for `company`
    pub async fn analyze(&self, company: &str, raw: &RawData) -> Result<AnalysisResults> {
        if raw.is_empty() {
            warn!(company, "Analyst called without data, skipping model call");
            return Ok(AnalysisResults::insufficient(format!(
                "No usable public data was found for {company}."
            )));
        }

        let prompt = match self.prompts.render_user(company, raw) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(company, error = %e, "Failed to render analyst prompt");
                return Ok(AnalysisResults {
                    degraded: true,
                    ..AnalysisResults::insufficient(format!(
                        "The analysis prompt for {company} could not be built."
                    ))
                });
            }
        };

        let request = CompletionRequest::prompt(self.settings.model.clone(), prompt)
            .with_system(ANALYST_SYSTEM)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);

        debug!(provider = self.llm.name(), model = %self.settings.model, "Requesting analysis");
        let response = tokio::time::timeout(self.settings.timeout, self.llm.complete(request))
            .await
            .map_err(|_| LLMError::Timeout(self.settings.timeout))??;

        debug!(model = %response.model, tokens = response.usage.total(), "Model replied");
        if response.truncated() {
            warn!(company, max_tokens = self.settings.max_tokens, "Model reply hit the token cap");
        }

        let results = parse_analysis(response.text(), &response.model);
        if results.degraded {
            warn!(company, "Model output could not be parsed, returning degraded result");
        }
        Ok(results)
    }
}

#[async_trait]
impl Step for Analyst {
    async fn run(&self, state: ResearchState) -> Result<ResearchState> {
        let results = self
            .analyze(state.company_name(), state.raw_data())
            .await
            .inspect_err(|e| error!(company = state.company_name(), error = %e, "Analysis failed"))?;

        info!(
            company = state.company_name(),
            recommendation = %results.recommendation,
            degraded = results.degraded,
            "Analysis complete"
        );

        Ok(state.with_analysis(results))
    }

    fn name(&self) -> &'static str {
        "analyst"
    }
}
