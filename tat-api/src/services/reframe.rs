//! Reframe scoring result
//!
//! Model replies are read leniently (every field optional) and then clamped
//! into range. When no score can be obtained a neutral fallback is used so
//! the player always gets feedback.

use serde::{Deserialize, Serialize};
use tat_common::analysis::AttributionDimensions;

use super::attribution::{json_span, strip_markdown_json};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;
pub const NEUTRAL_SCORE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReframeAttribution {
    pub has_attribution: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_statement: Option<String>,
    pub attribution_quality_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<AttributionDimensions>,
}

/// Dual helpfulness/attribution score of a reframe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReframeScore {
    pub helpfulness_score: f64,
    pub attribution_analysis: ReframeAttribution,
    pub feedback: String,
    pub improvements: Vec<String>,
    pub overall_score: f64,
}

/// Why a fallback score was returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Unparseable,
    Timeout,
    ApiFailure,
}

#[derive(Debug, Default, Deserialize)]
struct RawReframe {
    helpfulness_score: Option<f64>,
    attribution_analysis: Option<RawAttribution>,
    feedback: Option<String>,
    improvements: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAttribution {
    has_attribution: Option<bool>,
    attribution_statement: Option<String>,
    attribution_quality_score: Option<f64>,
    dimensions: Option<AttributionDimensions>,
}

fn clamp_score(score: Option<f64>) -> f64 {
    score
        .filter(|s| s.is_finite())
        .unwrap_or(NEUTRAL_SCORE)
        .clamp(MIN_SCORE, MAX_SCORE)
}

impl ReframeScore {
    /// Parse and normalize a model reply; None when no JSON object parses
    pub fn from_reply(reply: &str) -> Option<Self> {
        let span = json_span(strip_markdown_json(reply))?;
        let raw: RawReframe = serde_json::from_str(span).ok()?;
        Some(Self::from_raw(raw))
    }

    fn from_raw(raw: RawReframe) -> Self {
        let helpfulness_score = clamp_score(raw.helpfulness_score);
        let attribution = raw.attribution_analysis.unwrap_or_default();
        let has_attribution = attribution.has_attribution.unwrap_or(false);

        let (attribution_quality_score, overall_score) = if has_attribution {
            let quality = clamp_score(attribution.attribution_quality_score);
            (Some(quality), ((helpfulness_score + quality) / 2.0).round())
        } else {
            (None, helpfulness_score)
        };

        Self {
            helpfulness_score,
            attribution_analysis: ReframeAttribution {
                has_attribution,
                attribution_statement: attribution.attribution_statement,
                attribution_quality_score,
                dimensions: attribution.dimensions,
            },
            feedback: raw.feedback.unwrap_or_default(),
            improvements: raw.improvements.unwrap_or_default(),
            overall_score,
        }
    }

    /// Neutral score with guidance for the given failure
    pub fn fallback(reason: FallbackReason) -> Self {
        let (feedback, improvements): (&str, [&str; 2]) = match reason {
            FallbackReason::Unparseable => (
                "Unable to analyze reframe properly. Try making your reframe more specific and forward-focused.",
                [
                    "Be more specific about what to do differently",
                    "Focus on the next point rather than past mistakes",
                ],
            ),
            FallbackReason::Timeout => (
                "Request timeout. Please try again with a shorter reframe.",
                ["Keep your reframe concise", "Focus on one key improvement"],
            ),
            FallbackReason::ApiFailure => (
                "Unable to analyze reframe due to technical error. Try making your comment more specific and constructive.",
                ["Focus on specific improvements", "Use forward-looking language"],
            ),
        };

        Self {
            helpfulness_score: NEUTRAL_SCORE,
            attribution_analysis: ReframeAttribution {
                has_attribution: false,
                attribution_statement: None,
                attribution_quality_score: None,
                dimensions: None,
            },
            feedback: feedback.to_string(),
            improvements: improvements.iter().map(|s| s.to_string()).collect(),
            overall_score: NEUTRAL_SCORE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_clamped_and_averaged() {
        let reply = r#"```json
{
  "helpfulness_score": 14,
  "attribution_analysis": {
    "has_attribution": true,
    "attribution_quality_score": 6,
    "dimensions": {"locus": "internal", "stability": "unstable", "controllability": "controllable"}
  },
  "feedback": "Good",
  "improvements": ["Name the target"],
  "overall_score": 99
}
```"#;
        let score = ReframeScore::from_reply(reply).unwrap();
        assert_eq!(score.helpfulness_score, 10.0);
        assert_eq!(score.attribution_analysis.attribution_quality_score, Some(6.0));
        assert_eq!(score.overall_score, 8.0);
        assert_eq!(
            score.attribution_analysis.dimensions.unwrap().locus,
            "internal"
        );
    }

    #[test]
    fn test_missing_scores_default_to_neutral() {
        let score = ReframeScore::from_reply(
            r#"{"attribution_analysis": {"has_attribution": true}, "helpfulness_score": 0}"#,
        )
        .unwrap();
        assert_eq!(score.helpfulness_score, 1.0);
        assert_eq!(score.attribution_analysis.attribution_quality_score, Some(5.0));
        // (1 + 5) / 2
        assert_eq!(score.overall_score, 3.0);
    }

    #[test]
    fn test_without_attribution_overall_is_helpfulness() {
        let score = ReframeScore::from_reply(
            r#"{"helpfulness_score": 7.5, "attribution_analysis": {"has_attribution": false, "attribution_quality_score": 2}}"#,
        )
        .unwrap();
        assert_eq!(score.overall_score, 7.5);
        assert_eq!(score.attribution_analysis.attribution_quality_score, None);
    }

    #[test]
    fn test_unparseable_reply() {
        assert!(ReframeScore::from_reply("I cannot score this.").is_none());
        assert!(ReframeScore::from_reply(r#"{"helpfulness_score": "high"}"#).is_none());
    }

    #[test]
    fn test_fallbacks() {
        let timeout = ReframeScore::fallback(FallbackReason::Timeout);
        assert_eq!(timeout.overall_score, 5.0);
        assert!(timeout.feedback.starts_with("Request timeout"));
        assert_eq!(timeout.improvements.len(), 2);

        let value = serde_json::to_value(ReframeScore::fallback(FallbackReason::ApiFailure)).unwrap();
        assert_eq!(value["attribution_analysis"]["has_attribution"], false);
        assert!(value["attribution_analysis"]["attribution_quality_score"].is_null());
    }
}
