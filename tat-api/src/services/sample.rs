//! Demo analysis served without calling any external API

use std::sync::OnceLock;
use tat_common::analysis::AnalysisResult;

const SAMPLE_ANALYSIS_JSON: &str = include_str!("../../fixtures/sample_analysis.json");

static SAMPLE: OnceLock<Result<AnalysisResult, String>> = OnceLock::new();

/// Parsed sample analysis
///
/// The fixture is compiled in; a parse failure is reported as an error
/// message rather than a panic.
pub fn sample_analysis() -> Result<&'static AnalysisResult, &'static str> {
    SAMPLE
        .get_or_init(|| {
            serde_json::from_str(SAMPLE_ANALYSIS_JSON)
                .map_err(|e| format!("Sample analysis fixture is invalid: {}", e))
        })
        .as_ref()
        .map_err(String::as_str)
}
