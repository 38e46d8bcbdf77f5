//! Prompt templates for the analyst

use minijinja::{Environment, context};
use serde::Serialize;

use crate::state::RawData;

/// System prompt for the analyst model
pub const ANALYST_SYSTEM: &str = "You are a careful equity research analyst. \
Base every statement only on the data you are given and never invent figures. \
Answer with a single JSON object and nothing else.";

const ANALYST_TEMPLATE_NAME: &str = "analyst.user";

const ANALYST_TEMPLATE: &str = r#"Analyze {{ company }} as a potential investment using only the data below.

Company profile:
{% if profile %}{{ profile }}{% else %}Not available{% endif %}{% if website %}
Official website: {{ website }}{% endif %}

Recent news:
{% for item in news %}- {{ item.title }}{% if item.source %} ({{ item.source }}){% endif %}{% if item.snippet %}: {{ item.snippet }}{% endif %}
{% else %}No recent news
{% endfor %}
Stock quote:
{% if quote %}{{ quote.ticker }} at {{ quote.price }}{% if quote.currency %} {{ quote.currency }}{% endif %}{% if quote.change %} ({{ quote.change }} today){% endif %} via {{ quote.provider }}{% else %}Not available{% endif %}

Data quality: {{ quality }}

Respond with JSON in exactly this shape:
{"recommendation": "buy" | "hold" | "sell" | "insufficient_data",
 "summary": "two sentences on what the company does and where it stands now",
 "risks": ["up to three risks, at most 12 words each"],
 "opportunities": ["up to three opportunities, at most 12 words each"]}
Use "insufficient_data" when the data does not support a view."#;

#[derive(Serialize)]
struct NewsView<'a> {
    title: &'a str,
    snippet: &'a str,
    source: Option<&'a str>,
}

#[derive(Serialize)]
struct QuoteView<'a> {
    ticker: &'a str,
    price: String,
    currency: Option<&'a str>,
    change: Option<String>,
    provider: &'a str,
}

/// Compiled analyst prompt templates
pub struct AnalystPrompts {
    env: Environment<'static>,
}

impl AnalystPrompts {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(ANALYST_TEMPLATE_NAME, ANALYST_TEMPLATE)?;
        Ok(Self { env })
    }

    /// User prompt for `company` embedding everything collected
    pub fn render_user(&self, company: &str, raw: &RawData) -> Result<String, minijinja::Error> {
        let news: Vec<NewsView<'_>> = raw
            .news_items
            .iter()
            .map(|item| NewsView {
                title: &item.title,
                snippet: &item.snippet,
                source: item.source.as_deref(),
            })
            .collect();

        let quote = raw.stock_price.as_ref().map(|q| QuoteView {
            ticker: &q.ticker,
            price: format!("{:.2}", q.price),
            currency: q.currency.as_deref(),
            change: q.change_percent.map(|c| format!("{c:+.2}%")),
            provider: &q.provider,
        });

        let profile = raw.profile_summary.as_ref().map(|p| p.summary.as_str());

        self.env.get_template(ANALYST_TEMPLATE_NAME)?.render(context! {
            company,
            profile,
            website => raw.official_url.as_deref(),
            news,
            quote,
            quality => raw.data_quality.to_string(),
        })
    }
}
