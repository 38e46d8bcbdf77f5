//! Plain-text rendering of a finished research state

use crate::error::PulseError;
use crate::state::{DataSource, FailureKind, ResearchState, ValidationStatus};

/// Render the terminal state as a CLI report
pub fn render_text(state: &ResearchState) -> String {
    let raw = state.raw_data();
    let mut output = format!("📊 {}\n", state.company_name());

    for tag in &raw.data_source_errors {
        output.push_str(&banner(tag.source, tag.kind));
        output.push('\n');
    }
    output.push('\n');

    match state.validation_status() {
        ValidationStatus::Passed => {
            if let Some(results) = state.analysis_results() {
                output.push_str(&format!("Recommendation: {}\n", results.recommendation));
                if results.degraded {
                    output.push_str("(model output could not be structured, shown as received)\n");
                }
                output.push_str(&format!("\n{}\n", results.summary_text));
                push_list(&mut output, "Risks", &results.risks);
                push_list(&mut output, "Opportunities", &results.opportunities);
            }
        }
        ValidationStatus::Failed | ValidationStatus::Pending => {
            output.push_str(&format!(
                "❌ {}\n",
                state.validation_reason().unwrap_or("analysis was not run")
            ));
        }
    }

    if let Some(quote) = &raw.stock_price {
        output.push_str(&format!("\nPrice: {} {:.2}", quote.ticker, quote.price));
        if let Some(currency) = &quote.currency {
            output.push_str(&format!(" {currency}"));
        }
        if let Some(change) = quote.change_percent {
            output.push_str(&format!(" ({change:+.2}%)"));
        }
        output.push('\n');
    }

    output.push_str(&format!("Data quality: {}\n", raw.data_quality));
    push_list(&mut output, "Sources", &raw.sources);
    output
}

/// Render a run-level error
pub fn render_error(error: &PulseError) -> String {
    format!("❌ Error: {error}")
}

fn banner(source: DataSource, kind: FailureKind) -> String {
    match (source, kind) {
        (DataSource::StockQuote, FailureKind::Disabled) => {
            "ℹ️  Stock quotes are disabled".to_string()
        }
        (DataSource::StockQuote, FailureKind::MissingCredential) => {
            "⚠️  No stock price available (quote provider key not configured)".to_string()
        }
        (DataSource::StockQuote, kind) => format!("⚠️  No stock price available ({kind})"),
        (source, kind) => format!("⚠️  No {source} ({kind})"),
    }
}

fn push_list(output: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    output.push_str(&format!("\n{title}:\n"));
    for item in items {
        output.push_str(&format!("  • {item}\n"));
    }
}
