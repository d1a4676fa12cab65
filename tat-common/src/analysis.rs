//! Attribution analysis schema
//!
//! Typed form of the JSON the analysis model is asked to produce and the
//! `analysis_json` column stored with each session. Both `segments` and
//! `analysis_summary` are required; deserialization fails when either is
//! absent, so malformed analyses never reach storage or clients.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Canonical psychological pattern types
pub const PATTERN_TYPES: [&str; 8] = [
    "positive_reinforcement",
    "self_criticism",
    "tactical_focus",
    "emotional_regulation",
    "forward_focus",
    "backward_focus",
    "energy_management",
    "pattern_recognition",
];

/// Score at or above which a segment counts as a helpful thought
pub const HELPFUL_THRESHOLD: f64 = 7.0;

/// Full analysis of one transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub segments: Vec<Segment>,
    pub analysis_summary: AnalysisSummary,
}

impl AnalysisResult {
    /// Result with no segments and a zeroed summary
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            analysis_summary: AnalysisSummary::empty(),
        }
    }
}

/// One quote from the transcript with its scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: u32,
    pub quote: String,
    /// Free-form: models return strings ("2:15") or numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation: Option<String>,
    /// 1-10
    pub helpfulness_score: f64,
    #[serde(default)]
    pub psychological_patterns: Vec<PsychologicalPattern>,
    #[serde(default)]
    pub attribution_analysis: AttributionAnalysis,
    /// forward / backward / present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_direction: Option<String>,
}

impl Segment {
    pub fn is_helpful(&self) -> bool {
        self.helpfulness_score >= HELPFUL_THRESHOLD
    }
}

/// Read a missing or `null` string as empty
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychologicalPattern {
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub helpfulness_score: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub explanation: String,
    /// low / medium / high
    #[serde(default, deserialize_with = "null_as_empty")]
    pub intensity: String,
}

/// Causal explanation found in a segment, if any
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionAnalysis {
    #[serde(default)]
    pub has_attribution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<AttributionDimensions>,
    /// 1-10, only meaningful when `has_attribution`
    #[serde(default)]
    pub attribution_quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_explanation: Option<String>,
}

/// Weiner attribution axes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionDimensions {
    /// internal / external / mixed
    pub locus: String,
    /// stable / unstable / mixed
    pub stability: String,
    /// controllable / uncontrollable / mixed
    pub controllability: String,
}

/// Aggregate figures over all segments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSummary {
    pub total_segments: u32,
    /// Percentage string, e.g. "62%"
    pub helpful_thought_ratio: String,
    pub average_intensity: String,
    /// e.g. "40% forward"
    pub focus_direction_ratio: String,
    pub attribution_count: u32,
    pub average_attribution_quality: Option<f64>,
    pub pattern_distribution: BTreeMap<String, u32>,
    pub key_insights: Vec<String>,
    pub dominant_patterns: Vec<String>,
}

impl AnalysisSummary {
    /// Summary of an analysis that found nothing
    pub fn empty() -> Self {
        Self {
            total_segments: 0,
            helpful_thought_ratio: "0%".to_string(),
            average_intensity: "medium".to_string(),
            focus_direction_ratio: "0%".to_string(),
            attribution_count: 0,
            average_attribution_quality: None,
            pattern_distribution: BTreeMap::new(),
            key_insights: Vec::new(),
            dominant_patterns: Vec::new(),
        }
    }
}
