//! Company research pipeline
//!
//! Given a company name, this crate gathers public information about it,
//! checks that enough was found, and asks a language model for an
//! investment view:
//!
//! - `DataCollector`: encyclopedia profile, recent news and stock quote,
//!   fetched concurrently; failures are recorded, never raised
//! - `ValidationGate`: pure sufficiency check over the collected data
//! - `Analyst`: prompts the model and parses its reply, degrading on
//!   unparseable output
//! - `Orchestrator`: drives the steps through an explicit transition table
//!   with a single branch after validation
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_pulse::{Orchestrator, PulseConfig, report};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PulseConfig::from_env()?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!
//!     let state = orchestrator.run("Tesla").await?;
//!     println!("{}", report::render_text(&state));
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod prompts;
pub mod report;
pub mod state;
pub mod workflow;

pub use agents::{
    Analyst, AnalystSettings, DataCollector, Signal, Step, SufficiencyRule, ValidationGate,
};
pub use config::{PulseConfig, QuoteProvider};
pub use error::{PulseError, Result, SourceError};
pub use state::{
    AnalysisResults, CompanyProfile, DataQuality, DataSource, FailureKind, NewsItem, RawData,
    Recommendation, ResearchState, SourceErrorTag, StockQuote, ValidationStatus,
};
pub use workflow::{Node, Orchestrator};
