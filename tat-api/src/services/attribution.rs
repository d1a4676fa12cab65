//! Attribution analysis
//!
//! Long transcripts are split into sentence-aligned chunks, each chunk is
//! analyzed by Claude in turn, and the chunk results are merged into one
//! [`AnalysisResult`]. Replies are validated against the analysis schema;
//! a truncated or malformed reply is an error, never a partial result.

use std::collections::BTreeMap;
use tat_common::analysis::{AnalysisResult, AnalysisSummary, PATTERN_TYPES};
use thiserror::Error;
use tracing::{info, warn};

use super::claude_client::{ClaudeClient, ClaudeError};
use super::prompts::{analysis_prompt, reframe_prompt};
use super::reframe::{FallbackReason, ReframeScore};

/// Maximum characters per analysis chunk
pub const CHUNK_SIZE: usize = 4000;

/// Output token budget for one analysis chunk
pub const ANALYSIS_MAX_TOKENS: u32 = 8000;

/// Output token budget for a reframe score
pub const REFRAME_MAX_TOKENS: u32 = 1000;

/// Characters kept from each end of an unparseable reply
const EXCERPT_CHARS: usize = 160;

const SENTENCE_SEPARATOR: &str = ". ";

/// Reply could not be turned into an [`AnalysisResult`]
#[derive(Debug, Error)]
pub enum AnalysisParseError {
    #[error("No valid JSON found in response")]
    NoJson,

    #[error("invalid analysis JSON ({source}); reply excerpt: {excerpt}")]
    Invalid {
        #[source]
        source: serde_json::Error,
        excerpt: String,
    },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{}", claude_message(.0))]
    Claude(#[from] ClaudeError),

    #[error("Attribution analysis failed: {0}")]
    Parse(#[from] AnalysisParseError),
}

fn claude_message(err: &ClaudeError) -> String {
    match err {
        ClaudeError::InvalidApiKey | ClaudeError::RateLimited | ClaudeError::ServerError(_) => {
            err.to_string()
        }
        ClaudeError::Timeout => "Request timeout. The transcription may be too long. Try breaking it into smaller segments.".to_string(),
        other => format!("Attribution analysis failed: {}", other),
    }
}

/// Split a transcript into chunks of at most [`CHUNK_SIZE`] characters
///
/// Sentences end at `.`, `!` or `?` followed by whitespace. The terminator
/// and whitespace are dropped and sentences are rejoined with `". "`. A
/// single sentence longer than the budget becomes its own chunk.
pub fn chunk_transcription(text: &str) -> Vec<String> {
    if text.chars().count() <= CHUNK_SIZE {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        let joined_len = if current.is_empty() {
            sentence_len
        } else {
            current_len + SENTENCE_SEPARATOR.len() + sentence_len
        };

        if joined_len > CHUNK_SIZE && !current.is_empty() {
            chunks.push(current.trim().to_string());
            current = sentence.to_string();
            current_len = sentence_len;
        } else {
            if !current.is_empty() {
                current.push_str(SENTENCE_SEPARATOR);
            }
            current.push_str(sentence);
            current_len = joined_len;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(_, next)) = iter.peek() else {
            continue;
        };
        if !next.is_whitespace() {
            continue;
        }

        sentences.push(&text[start..i]);
        let mut end = i + c.len_utf8();
        while let Some(&(j, w)) = iter.peek() {
            if !w.is_whitespace() {
                break;
            }
            end = j + w.len_utf8();
            iter.next();
        }
        start = end;
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Remove a surrounding Markdown code fence, if any
pub fn strip_markdown_json(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let after_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed.trim_start_matches('`'),
    };
    after_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(after_open)
        .trim()
}

/// Outermost `{ ... }` span of a reply
pub(crate) fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn excerpt(text: &str) -> String {
    let count = text.chars().count();
    if count <= EXCERPT_CHARS * 2 {
        return text.to_string();
    }
    let head: String = text.chars().take(EXCERPT_CHARS).collect();
    let tail: String = text.chars().skip(count - EXCERPT_CHARS).collect();
    format!("{} ... {}", head, tail)
}

/// Validate a model reply against the analysis schema
///
/// A reply cut off before its closing brace is parsed from the first `{`
/// so the serde error names where it ended.
pub fn parse_analysis_reply(reply: &str) -> Result<AnalysisResult, AnalysisParseError> {
    let body = strip_markdown_json(reply);
    let start = body.find('{').ok_or(AnalysisParseError::NoJson)?;
    let span = json_span(body).unwrap_or(&body[start..]);
    serde_json::from_str(span).map_err(|source| AnalysisParseError::Invalid {
        source,
        excerpt: excerpt(body),
    })
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as u32
    }
}

fn unique_limited(values: impl Iterator<Item = String>, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if out.len() == limit {
            break;
        }
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Combine chunk results into one analysis
pub fn merge_chunk_results(mut results: Vec<AnalysisResult>) -> AnalysisResult {
    match results.len() {
        0 => return AnalysisResult::empty(),
        1 => return results.remove(0),
        _ => {}
    }

    let mut segments = Vec::new();
    for result in &results {
        for segment in &result.segments {
            let mut segment = segment.clone();
            segment.segment_id = segments.len() as u32 + 1;
            segments.push(segment);
        }
    }

    let pattern_distribution: BTreeMap<String, u32> = PATTERN_TYPES
        .iter()
        .map(|key| {
            let total: u32 = results
                .iter()
                .filter_map(|r| r.analysis_summary.pattern_distribution.get(*key))
                .sum();
            (key.to_string(), total)
        })
        .collect();

    let total = segments.len();
    let helpful = segments.iter().filter(|s| s.is_helpful()).count();
    let forward = segments
        .iter()
        .filter(|s| s.focus_direction.as_deref() == Some("forward"))
        .count();

    let attributed: Vec<f64> = segments
        .iter()
        .filter(|s| s.attribution_analysis.has_attribution)
        .map(|s| s.attribution_analysis.attribution_quality_score.unwrap_or(0.0))
        .collect();
    let average_attribution_quality = if attributed.is_empty() {
        None
    } else {
        Some((attributed.iter().sum::<f64>() / attributed.len() as f64).round())
    };

    let key_insights = unique_limited(
        results
            .iter()
            .flat_map(|r| r.analysis_summary.key_insights.iter().cloned()),
        5,
    );
    let dominant_patterns = unique_limited(
        results
            .iter()
            .flat_map(|r| r.analysis_summary.dominant_patterns.iter().cloned()),
        3,
    );

    AnalysisResult {
        analysis_summary: AnalysisSummary {
            total_segments: total as u32,
            helpful_thought_ratio: format!("{}%", percent(helpful, total)),
            average_intensity: "medium".to_string(),
            focus_direction_ratio: format!("{}% forward", percent(forward, total)),
            attribution_count: attributed.len() as u32,
            average_attribution_quality,
            pattern_distribution,
            key_insights,
            dominant_patterns,
        },
        segments,
    }
}

/// Merged analysis plus chunk bookkeeping
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub chunks_total: usize,
    pub chunks_processed: usize,
}

/// Claude-backed attribution analysis and reframe scoring
pub struct AttributionService {
    claude: ClaudeClient,
}

impl AttributionService {
    pub fn new(claude: ClaudeClient) -> Self {
        Self { claude }
    }

    pub fn model(&self) -> &str {
        self.claude.model()
    }

    /// Analyze a transcript
    ///
    /// Chunks run sequentially. A failed chunk is skipped; the call fails
    /// only if every chunk failed, with the last error.
    pub async fn analyze(&self, transcription: &str) -> Result<AnalysisOutcome, AnalysisError> {
        let chunks = chunk_transcription(transcription);
        let total = chunks.len();
        info!(
            chunks = total,
            characters = transcription.chars().count(),
            "Starting attribution analysis"
        );

        let mut results = Vec::with_capacity(total);
        let mut last_error = None;

        for (index, chunk) in chunks.iter().enumerate() {
            info!("Processing chunk {}/{}", index + 1, total);
            match self.analyze_chunk(chunk, index, total).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Failed to process chunk {}: {}", index + 1, e);
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let processed = results.len();
        let result = merge_chunk_results(results);
        info!(
            segments = result.segments.len(),
            chunks_processed = processed,
            "Attribution analysis completed"
        );

        Ok(AnalysisOutcome {
            result,
            chunks_total: total,
            chunks_processed: processed,
        })
    }

    async fn analyze_chunk(
        &self,
        chunk: &str,
        index: usize,
        total: usize,
    ) -> Result<AnalysisResult, AnalysisError> {
        let prompt = analysis_prompt(chunk, index, total);
        let reply = self.claude.complete(&prompt, ANALYSIS_MAX_TOKENS).await?;
        Ok(parse_analysis_reply(&reply)?)
    }

    /// Score a reframe; falls back to a neutral score instead of failing
    pub async fn score_reframe(
        &self,
        original_quote: &str,
        player_reframe: &str,
        context: &str,
    ) -> ReframeScore {
        let prompt = reframe_prompt(original_quote, player_reframe, context);

        let reply = match self.claude.complete(&prompt, REFRAME_MAX_TOKENS).await {
            Ok(reply) => reply,
            Err(ClaudeError::Timeout) => {
                warn!("Reframe scoring timed out");
                return ReframeScore::fallback(FallbackReason::Timeout);
            }
            Err(e) => {
                warn!("Reframe scoring error: {}", e);
                return ReframeScore::fallback(FallbackReason::ApiFailure);
            }
        };

        match ReframeScore::from_reply(&reply) {
            Some(score) => {
                info!(
                    helpfulness = score.helpfulness_score,
                    overall = score.overall_score,
                    "Reframe scoring completed"
                );
                score
            }
            None => {
                warn!("Could not parse reframe score reply");
                ReframeScore::fallback(FallbackReason::Unparseable)
            }
        }
    }
}
