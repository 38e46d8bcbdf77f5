//! Command-line interface for stock-pulse

use anyhow::Context;
use clap::Parser;
use pulse_utils::LogFormat;
use std::process::ExitCode;
use stock_pulse::{Orchestrator, PulseConfig, QuoteProvider, SufficiencyRule, report};
use tracing::info;

const DEFAULT_LOG_FILTER: &str = "warn,stock_pulse=info";

#[derive(Parser, Debug)]
#[command(name = "stock-pulse")]
#[command(about = "Research a company: profile, news, quote and an LLM investment view", long_about = None)]
struct Args {
    /// Company name, e.g. "Tesla" or "Tata Motors"
    #[arg(required = true, num_args = 1..)]
    company: Vec<String>,

    /// Print the full research state as JSON
    #[arg(long)]
    json: bool,

    /// Log output format (pretty or json)
    #[arg(long, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Override the quote provider (yahoo, indianapi, disabled)
    #[arg(long)]
    quote_provider: Option<QuoteProvider>,

    /// Override the analyst model
    #[arg(long)]
    model: Option<String>,

    /// Minimum number of data signals required for analysis (1-3)
    #[arg(long)]
    min_signals: Option<usize>,
}

impl Args {
    fn company_name(&self) -> String {
        self.company.join(" ")
    }

    /// Environment configuration with command-line overrides applied
    fn config(&self) -> anyhow::Result<PulseConfig> {
        let mut config = PulseConfig::from_env().context("failed to load configuration")?;

        if let Some(provider) = self.quote_provider {
            config.quote_provider = provider;
        }
        if let Some(model) = &self.model {
            config.analyst_model.clone_from(model);
        }
        if let Some(min_signals) = self.min_signals {
            config.sufficiency = SufficiencyRule::at_least(min_signals);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    pulse_utils::init_tracing_with(DEFAULT_LOG_FILTER, args.log_format);

    let config = args.config()?;
    let orchestrator =
        Orchestrator::from_config(&config).context("failed to build the research pipeline")?;

    let company = args.company_name();
    info!(company = %company, provider = %config.quote_provider, "Starting research");

    match orchestrator.run(&company).await {
        Ok(state) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("{}", report::render_text(&state));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", report::render_error(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}
