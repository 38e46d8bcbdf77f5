//! Pipeline steps
//!
//! Each step receives the research state by value and returns the next
//! revision. A step only writes the fields it owns.

pub mod analyst;
pub mod collector;
pub mod gate;
mod parsing;

pub use analyst::{Analyst, AnalystSettings};
pub use collector::DataCollector;
pub use gate::{Signal, SufficiencyRule, ValidationGate};

use async_trait::async_trait;

use crate::error::Result;
use crate::state::ResearchState;

/// One stage of the research workflow
#[async_trait]
pub trait Step: Send + Sync {
    /// Run the step and return the revised state
    async fn run(&self, state: ResearchState) -> Result<ResearchState>;

    /// Step name used in logs
    fn name(&self) -> &str;
}
