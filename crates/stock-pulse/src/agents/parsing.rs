//! Parsing of model output into [`AnalysisResults`]
//!
//! Tries a JSON object first, then `Recommendation:`/`Summary:`/`Risks:`/
//! `Opportunities:` sections, and finally degrades to the raw text. Never
//! fails.

use serde::Deserialize;

use crate::state::{AnalysisResults, Recommendation};

/// Shape requested from the model
#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    recommendation: String,
    #[serde(default, alias = "summary_text")]
    summary: String,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    opportunities: Vec<String>,
}

#[derive(Debug, Default)]
struct Parsed {
    recommendation: Option<Recommendation>,
    summary: String,
    risks: Vec<String>,
    opportunities: Vec<String>,
}

impl Parsed {
    fn into_results(self, model: &str) -> Option<AnalysisResults> {
        let recommendation = self.recommendation?;
        let summary = self.summary.trim().to_string();
        if summary.is_empty() && self.risks.is_empty() && self.opportunities.is_empty() {
            return None;
        }

        Some(AnalysisResults {
            recommendation,
            summary_text: summary,
            risks: clean_items(self.risks),
            opportunities: clean_items(self.opportunities),
            model: Some(model.to_string()),
            degraded: false,
        })
    }
}

/// Turn raw model output into analysis results
pub(crate) fn parse_analysis(output: &str, model: &str) -> AnalysisResults {
    parse_json(output)
        .and_then(|parsed| parsed.into_results(model))
        .or_else(|| parse_sections(output).into_results(model))
        .unwrap_or_else(|| degraded(output, model))
}

fn degraded(output: &str, model: &str) -> AnalysisResults {
    AnalysisResults {
        recommendation: Recommendation::InsufficientData,
        summary_text: output.trim().to_string(),
        risks: Vec::new(),
        opportunities: Vec::new(),
        model: Some(model.to_string()),
        degraded: true,
    }
}

/// First JSON object in the output with the expected shape; fences and
/// prose on either side are ignored
fn parse_json(output: &str) -> Option<Parsed> {
    let payload = output.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&output[start..])
            .into_iter::<AnalysisPayload>()
            .next()?
            .ok()
    })?;

    Some(Parsed {
        recommendation: Recommendation::from_text(&payload.recommendation),
        summary: payload.summary,
        risks: payload.risks,
        opportunities: payload.opportunities,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Recommendation,
    Summary,
    Risks,
    Opportunities,
}

/// Section heading with any text following the colon
fn heading(line: &str) -> Option<(Section, &str)> {
    let cleaned = line.trim().trim_start_matches(['#', '*', ' ']);
    let (label, rest) = cleaned.split_once(':')?;

    let section = match label.trim().trim_matches('*').trim().to_lowercase().as_str() {
        "recommendation" | "rating" => Section::Recommendation,
        "summary" | "executive summary" => Section::Summary,
        "risks" | "key risks" => Section::Risks,
        "opportunities" | "key opportunities" => Section::Opportunities,
        _ => return None,
    };

    Some((section, rest.trim().trim_start_matches('*').trim()))
}

fn bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    for marker in ["•", "-", "*", "–"] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }

    // numbered items: "1." or "1)"
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(item) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return Some(item.trim());
        }
    }
    None
}

fn parse_sections(output: &str) -> Parsed {
    let mut parsed = Parsed::default();
    let mut current: Option<Section> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some((section, rest)) = heading(line) {
            current = Some(section);
            if !rest.is_empty() {
                push_line(&mut parsed, section, rest);
            }
            continue;
        }

        if let Some(section) = current {
            let text = bullet(line).unwrap_or_else(|| line.trim());
            push_line(&mut parsed, section, text);
        }
    }

    parsed
}

fn push_line(parsed: &mut Parsed, section: Section, text: &str) {
    match section {
        Section::Recommendation => {
            if parsed.recommendation.is_none() {
                parsed.recommendation = Recommendation::from_text(text);
            }
        }
        Section::Summary => {
            if !parsed.summary.is_empty() {
                parsed.summary.push(' ');
            }
            parsed.summary.push_str(text);
        }
        Section::Risks => parsed.risks.push(text.to_string()),
        Section::Opportunities => parsed.opportunities.push(text.to_string()),
    }
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| bullet(&item).unwrap_or(item.as_str()).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "llama-3.3-70b-versatile";

    #[test]
    fn test_plain_json() {
        let output = r#"{"recommendation": "buy", "summary": "Tesla leads EVs.", "risks": ["Competition"], "opportunities": ["Energy storage"]}"#;
        let results = parse_analysis(output, MODEL);

        assert_eq!(results.recommendation, Recommendation::Buy);
        assert_eq!(results.summary_text, "Tesla leads EVs.");
        assert_eq!(results.risks, vec!["Competition"]);
        assert_eq!(results.opportunities, vec!["Energy storage"]);
        assert_eq!(results.model.as_deref(), Some(MODEL));
        assert!(!results.degraded);
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let output = "Here is my analysis:\n```json\n{\n  \"recommendation\": \"Strong Buy\",\n  \"summary\": \"Solid.\",\n  \"risks\": [\"- Valuation\", \"\"],\n  \"opportunities\": []\n}\n```\nHope this helps.";
        let results = parse_analysis(output, MODEL);

        assert_eq!(results.recommendation, Recommendation::Buy);
        assert_eq!(results.risks, vec!["Valuation"]);
        assert!(results.opportunities.is_empty());
        assert!(!results.degraded);
    }

    #[test]
    fn test_sectioned_text() {
        let output = "\
**Recommendation:** HOLD

**Summary:**
Infosys is a large IT services company.
Growth has slowed.

**Risks:**
• Client budget cuts
- Currency swings

**Opportunities:**
1. AI services demand
2) Margin expansion
";
        let results = parse_analysis(output, MODEL);

        assert_eq!(results.recommendation, Recommendation::Hold);
        assert_eq!(
            results.summary_text,
            "Infosys is a large IT services company. Growth has slowed."
        );
        assert_eq!(results.risks, vec!["Client budget cuts", "Currency swings"]);
        assert_eq!(
            results.opportunities,
            vec!["AI services demand", "Margin expansion"]
        );
        assert!(!results.degraded);
    }

    #[test]
    fn test_trailing_prose_with_braces() {
        let output = "{\"recommendation\": \"hold\", \"summary\": \"Fairly valued.\", \"risks\": [\"Debt\"]}\n\nNote: figures use the {latest} quote available }";
        let results = parse_analysis(output, MODEL);

        assert_eq!(results.recommendation, Recommendation::Hold);
        assert_eq!(results.summary_text, "Fairly valued.");
        assert_eq!(results.risks, vec!["Debt"]);
        assert!(!results.degraded);
    }

    #[test]
    fn test_leading_prose_with_braces() {
        let output = "Using {profile, news} only:\n{\"recommendation\": \"sell\", \"summary\": \"Losses widen.\"}";
        let results = parse_analysis(output, MODEL);
        assert_eq!(results.recommendation, Recommendation::Sell);
        assert!(!results.degraded);
    }

    #[test]
    fn test_recommendation_with_commentary() {
        let output = "Recommendation: BUY (high conviction)\nSummary: Order book keeps growing.\nRisks:\n- Execution";
        let results = parse_analysis(output, MODEL);

        assert_eq!(results.recommendation, Recommendation::Buy);
        assert_eq!(results.summary_text, "Order book keeps growing.");
        assert_eq!(results.risks, vec!["Execution"]);
        assert!(!results.degraded);
    }

    #[test]
    fn test_unparseable_output_degrades() {
        let output = "I cannot say much about this company, sorry.";
        let results = parse_analysis(output, MODEL);

        assert_eq!(results.recommendation, Recommendation::InsufficientData);
        assert_eq!(results.summary_text, output);
        assert!(results.risks.is_empty());
        assert!(results.degraded);
    }

    #[test]
    fn test_unknown_recommendation_degrades() {
        let output = r#"{"recommendation": "to the moon", "summary": "Great."}"#;
        let results = parse_analysis(output, MODEL);
        assert!(results.degraded);
        assert_eq!(results.summary_text, output);
    }

    #[test]
    fn test_truncated_json_falls_back_to_sections() {
        let output = "{\"recommendation\": \"sell\", \"summ\nRecommendation: sell\nSummary: Weak demand.";
        let results = parse_analysis(output, MODEL);
        assert_eq!(results.recommendation, Recommendation::Sell);
        assert_eq!(results.summary_text, "Weak demand.");
        assert!(!results.degraded);
    }

    #[test]
    fn test_empty_output_degrades() {
        let results = parse_analysis("   ", MODEL);
        assert!(results.degraded);
        assert!(results.summary_text.is_empty());
    }
}
