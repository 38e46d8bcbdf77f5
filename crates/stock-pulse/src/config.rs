//! Configuration for the research pipeline

use crate::agents::gate::SufficiencyRule;
use crate::error::{PulseError, Result};
use pulse_utils::{env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ANALYST_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_FALLBACK_MODEL: &str = "mixtral-8x7b-32768";

/// Provider used for the stock quote lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteProvider {
    /// Yahoo Finance (default, no API key required)
    #[default]
    Yahoo,
    /// IndianAPI for NSE/BSE listings, falling back to Yahoo Finance when it
    /// has no key or no quote
    IndianApi,
    /// Skip the quote lookup entirely
    Disabled,
}

impl FromStr for QuoteProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "indianapi" | "indian_api" | "indian-api" => Ok(Self::IndianApi),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(format!(
                "unknown quote provider '{other}' (expected yahoo, indianapi or disabled)"
            )),
        }
    }
}

impl fmt::Display for QuoteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Yahoo => "yahoo",
            Self::IndianApi => "indianapi",
            Self::Disabled => "disabled",
        };
        f.write_str(text)
    }
}

/// Configuration for one pipeline instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Groq API key; required to build the analyst
    #[serde(skip_serializing)]
    pub groq_api_key: Option<String>,

    /// Override for the OpenAI-compatible base URL
    pub groq_api_base: Option<String>,

    /// Model used by the analyst
    pub analyst_model: String,

    /// Model tried once when the analyst model is not found
    pub fallback_model: Option<String>,

    /// Sampling temperature, 0.0 to 1.0
    pub temperature: f32,

    /// Completion token cap
    pub max_tokens: usize,

    /// Stock quote provider
    pub quote_provider: QuoteProvider,

    /// IndianAPI key (optional)
    #[serde(skip_serializing)]
    pub indian_api_key: Option<String>,

    /// Number of news results kept
    pub news_limit: usize,

    /// Timeout for each data-source lookup
    pub request_timeout: Duration,

    /// Timeout for the analyst completion call
    pub llm_timeout: Duration,

    /// Threshold applied by the validation gate
    pub sufficiency: SufficiencyRule,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            groq_api_base: None,
            analyst_model: DEFAULT_ANALYST_MODEL.to_string(),
            fallback_model: Some(DEFAULT_FALLBACK_MODEL.to_string()),
            temperature: 0.7,
            max_tokens: 1024,
            quote_provider: QuoteProvider::Yahoo,
            indian_api_key: None,
            news_limit: 5,
            request_timeout: Duration::from_secs(10),
            llm_timeout: Duration::from_secs(60),
            sufficiency: SufficiencyRule::default(),
        }
    }
}

impl PulseConfig {
    /// Create a new configuration builder
    pub fn builder() -> PulseConfigBuilder {
        PulseConfigBuilder::default()
    }

    /// Load configuration from environment variables
    ///
    /// Unset, blank and placeholder values fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(key) = env_string("GROQ_API_KEY") {
            builder = builder.groq_api_key(key);
        }
        if let Some(base) = env_string("GROQ_API_BASE") {
            builder = builder.groq_api_base(base);
        }
        if let Some(model) = env_string("PULSE_ANALYST_MODEL") {
            builder = builder.analyst_model(model);
        }
        if let Some(model) = env_string("PULSE_FALLBACK_MODEL") {
            builder = builder.fallback_model(model);
        }
        if let Some(temperature) = env_parse::<f32>("PULSE_TEMPERATURE")? {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = env_parse::<usize>("PULSE_MAX_TOKENS")? {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(provider) = env_parse::<QuoteProvider>("PULSE_QUOTE_PROVIDER")? {
            builder = builder.quote_provider(provider);
        }
        if let Some(key) = env_string("INDIAN_API_KEY") {
            builder = builder.indian_api_key(key);
        }
        if let Some(limit) = env_parse::<usize>("PULSE_NEWS_LIMIT")? {
            builder = builder.news_limit(limit);
        }
        if let Some(secs) = env_parse::<u64>("PULSE_REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("PULSE_LLM_TIMEOUT_SECS")? {
            builder = builder.llm_timeout(Duration::from_secs(secs));
        }
        if let Some(min_signals) = env_parse::<usize>("PULSE_MIN_SIGNALS")? {
            builder = builder.sufficiency(SufficiencyRule::at_least(min_signals));
        }

        builder.build()
    }

    /// Validate the configuration
    ///
    /// A missing Groq key is not an error here: it only matters once the
    /// analyst is built.
    pub fn validate(&self) -> Result<()> {
        if self.analyst_model.trim().is_empty() {
            return Err(PulseError::Config("analyst_model must not be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(PulseError::Config(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            )));
        }

        if self.max_tokens == 0 {
            return Err(PulseError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.news_limit == 0 {
            return Err(PulseError::Config(
                "news_limit must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.llm_timeout.is_zero() {
            return Err(PulseError::Config("timeouts must be non-zero".to_string()));
        }

        self.sufficiency.validate()
    }
}

/// Builder for PulseConfig
#[derive(Debug, Default)]
pub struct PulseConfigBuilder {
    groq_api_key: Option<String>,
    groq_api_base: Option<String>,
    analyst_model: Option<String>,
    fallback_model: Option<Option<String>>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    quote_provider: Option<QuoteProvider>,
    indian_api_key: Option<String>,
    news_limit: Option<usize>,
    request_timeout: Option<Duration>,
    llm_timeout: Option<Duration>,
    sufficiency: Option<SufficiencyRule>,
}

impl PulseConfigBuilder {
    pub fn groq_api_key(mut self, key: impl Into<String>) -> Self {
        self.groq_api_key = Some(key.into());
        self
    }

    pub fn groq_api_base(mut self, base: impl Into<String>) -> Self {
        self.groq_api_base = Some(base.into());
        self
    }

    pub fn analyst_model(mut self, model: impl Into<String>) -> Self {
        self.analyst_model = Some(model.into());
        self
    }

    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(Some(model.into()));
        self
    }

    /// Disable the fallback model
    pub fn no_fallback_model(mut self) -> Self {
        self.fallback_model = Some(None);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn quote_provider(mut self, provider: QuoteProvider) -> Self {
        self.quote_provider = Some(provider);
        self
    }

    pub fn indian_api_key(mut self, key: impl Into<String>) -> Self {
        self.indian_api_key = Some(key.into());
        self
    }

    pub fn news_limit(mut self, limit: usize) -> Self {
        self.news_limit = Some(limit);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = Some(timeout);
        self
    }

    pub fn sufficiency(mut self, rule: SufficiencyRule) -> Self {
        self.sufficiency = Some(rule);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PulseConfig> {
        let defaults = PulseConfig::default();

        let config = PulseConfig {
            groq_api_key: self.groq_api_key,
            groq_api_base: self.groq_api_base,
            analyst_model: self.analyst_model.unwrap_or(defaults.analyst_model),
            fallback_model: self.fallback_model.unwrap_or(defaults.fallback_model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            quote_provider: self.quote_provider.unwrap_or(defaults.quote_provider),
            indian_api_key: self.indian_api_key,
            news_limit: self.news_limit.unwrap_or(defaults.news_limit),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            llm_timeout: self.llm_timeout.unwrap_or(defaults.llm_timeout),
            sufficiency: self.sufficiency.unwrap_or(defaults.sufficiency),
        };

        config.validate()?;
        Ok(config)
    }
}
