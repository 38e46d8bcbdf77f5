//! Validation gate
//!
//! Decides whether the collected data is sufficient to be worth analyzing.
//! The decision is a pure function of the raw data and the configured
//! [`SufficiencyRule`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

use super::Step;
use crate::error::{PulseError, Result};
use crate::state::{DataSource, RawData, ResearchState, Verdict};

/// One kind of evidence the gate counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Encyclopedia profile present
    Profile,
    /// At least one news item
    News,
    /// Stock quote present
    Price,
}

impl Signal {
    pub const ALL: [Self; 3] = [Self::Profile, Self::News, Self::Price];

    pub fn present(self, raw: &RawData) -> bool {
        match self {
            Self::Profile => raw.profile_summary.is_some(),
            Self::News => !raw.news_items.is_empty(),
            Self::Price => raw.stock_price.is_some(),
        }
    }

    fn source(self) -> DataSource {
        match self {
            Self::Profile => DataSource::Encyclopedia,
            Self::News => DataSource::News,
            Self::Price => DataSource::StockQuote,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no {}", self.source())
    }
}

/// How much evidence the gate requires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SufficiencyRule {
    /// Minimum number of present signals
    pub min_signals: usize,
    /// Signals that must be present regardless of the count
    pub required: BTreeSet<Signal>,
}

impl Default for SufficiencyRule {
    fn default() -> Self {
        Self::at_least(1)
    }
}

impl SufficiencyRule {
    /// Require at least `min_signals` signals, none mandatory
    pub fn at_least(min_signals: usize) -> Self {
        Self {
            min_signals,
            required: BTreeSet::new(),
        }
    }

    /// Additionally require `signal`
    pub fn require(mut self, signal: Signal) -> Self {
        self.required.insert(signal);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=Signal::ALL.len()).contains(&self.min_signals) {
            return Err(PulseError::Config(format!(
                "min_signals must be between 1 and {}, got {}",
                Signal::ALL.len(),
                self.min_signals
            )));
        }
        Ok(())
    }

    /// Decide whether `raw` is sufficient for analysis
    ///
    /// Data with no signal at all never passes, whatever `min_signals` says.
    pub fn evaluate(&self, company: &str, raw: &RawData) -> Verdict {
        let missing: Vec<Signal> = Signal::ALL
            .into_iter()
            .filter(|signal| !signal.present(raw))
            .collect();
        let present = Signal::ALL.len() - missing.len();
        let required_missing = self.required.iter().any(|signal| missing.contains(signal));

        if present >= self.min_signals.max(1) && !required_missing {
            return Verdict::passed();
        }

        let gaps = missing
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Verdict::failed(format!("insufficient data for {company}: {gaps}"))
    }
}

/// Step wrapper around a [`SufficiencyRule`]
#[derive(Debug, Clone, Default)]
pub struct ValidationGate {
    rule: SufficiencyRule,
}

impl ValidationGate {
    /// Fails with [`PulseError::Config`] when the rule is out of range
    pub fn new(rule: SufficiencyRule) -> Result<Self> {
        rule.validate()?;
        Ok(Self { rule })
    }
}

#[async_trait]
impl Step for ValidationGate {
    async fn run(&self, state: ResearchState) -> Result<ResearchState> {
        let verdict = self.rule.evaluate(state.company_name(), state.raw_data());

        match verdict.reason.as_deref() {
            None => info!(company = state.company_name(), "Data sufficient, proceeding to analysis"),
            Some(reason) => warn!(company = state.company_name(), reason, "Validation failed"),
        }

        Ok(state.with_verdict(verdict))
    }

    fn name(&self) -> &'static str {
        "validation_gate"
    }
}
