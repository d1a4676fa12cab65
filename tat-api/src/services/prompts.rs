//! Prompt templates for the analysis model

/// Structured segment analysis prompt for one transcript chunk
///
/// `chunk_index` is zero-based; the chunk note is added only when there is
/// more than one chunk.
pub fn analysis_prompt(chunk: &str, chunk_index: usize, total_chunks: usize) -> String {
    let chunk_note = if total_chunks > 1 {
        format!(
            "\n\nNOTE: This is chunk {} of {}. Analyze this segment independently.",
            chunk_index + 1,
            total_chunks
        )
    } else {
        String::new()
    };

    format!(
        r#"Analyze this Spanish tennis player transcription for psychological patterns and attributions. Provide segment-by-segment analysis.{chunk_note}

TRANSCRIPTION: "{chunk}"

For each distinct quote/comment, provide a JSON response with this structure:

{{
  "segments": [
    {{
      "segment_id": number,
      "quote": "exact quote",
      "timestamp": "time if available",
      "situation": "brief context",
      "helpfulness_score": number (1-10),
      "psychological_patterns": [
        {{
          "type": "pattern_type",
          "helpfulness_score": number (1-10),
          "explanation": "concise explanation (max 15 words)",
          "intensity": "low/medium/high"
        }}
      ],
      "attribution_analysis": {{
        "has_attribution": boolean,
        "attribution_statement": "causal explanation if present",
        "dimensions": {{
          "locus": "internal/external/mixed",
          "stability": "stable/unstable/mixed",
          "controllability": "controllable/uncontrollable/mixed"
        }},
        "attribution_quality_score": number (1-10, only if has_attribution is true),
        "attribution_explanation": "concise impact (max 15 words)"
      }},
      "focus_direction": "forward/backward/present"
    }}
  ],
  "analysis_summary": {{
    "total_segments": number,
    "helpful_thought_ratio": "X%",
    "average_intensity": "low/medium/high",
    "focus_direction_ratio": "X% forward",
    "attribution_count": number,
    "average_attribution_quality": number,
    "pattern_distribution": {{
      "positive_reinforcement": number,
      "self_criticism": number,
      "tactical_focus": number,
      "emotional_regulation": number,
      "forward_focus": number,
      "backward_focus": number,
      "energy_management": number,
      "pattern_recognition": number
    }},
    "key_insights": ["insight 1", "insight 2"],
    "dominant_patterns": ["pattern1", "pattern2"]
  }}
}}

SCORING CRITERIA:

HELPFULNESS SCORE (1-10):
- 8-10: Builds confidence, motivates, solution-focused
- 5-7: Neutral impact, mixed elements
- 1-4: Undermines confidence, harsh self-criticism

ATTRIBUTION QUALITY SCORE (1-10, only when causal explanations present):
- 8-10: Internal-Controllable attributions that empower
- 5-7: Mixed or partially helpful attributions
- 1-4: External-Uncontrollable attributions that create helplessness

PSYCHOLOGICAL PATTERN TYPES:
- positive_reinforcement: Self-praise
- self_criticism: Negative evaluation
- tactical_focus: Strategy
- emotional_regulation: Managing frustration
- forward_focus: Next point mentality
- backward_focus: Dwelling on past
- energy_management: Motivational
- pattern_recognition: Learning

Respond with the JSON object only. Focus on realistic, observable patterns. Keep explanations concise to save space."#
    )
}

/// Dual-score prompt for a player's rewrite of a quote
pub fn reframe_prompt(original_quote: &str, player_reframe: &str, context: &str) -> String {
    format!(
        r#"Score this reframe for a Spanish tennis player. Analyze both general helpfulness and attribution quality.

Original: "{original_quote}"
Player's reframe: "{player_reframe}"
Context: "{context}"

Provide a JSON response with dual scoring:

{{
  "helpfulness_score": number (1-10),
  "attribution_analysis": {{
    "has_attribution": boolean,
    "attribution_statement": "causal explanation if present",
    "attribution_quality_score": number (1-10, only if has_attribution is true),
    "dimensions": {{
      "locus": "internal/external/mixed",
      "stability": "stable/unstable/mixed",
      "controllability": "controllable/uncontrollable/mixed"
    }}
  }},
  "feedback": "comprehensive explanation covering both scores",
  "improvements": ["specific suggestion 1", "specific suggestion 2"],
  "overall_score": number (average of helpfulness and attribution quality if present, otherwise just helpfulness)
}}

SCORING CRITERIA:

HELPFULNESS SCORE (1-10):
- 8-10: Builds confidence, solution-oriented, forward-focused, specific tactical advice
- 5-7: Neutral or mixed impact, somewhat helpful but could be better
- 1-4: Undermines confidence, dwelling on past, vague, unhelpful

ATTRIBUTION QUALITY SCORE (1-10, only when causal explanations present):
- 8-10: Internal-Controllable attributions that empower ("I need to adjust my grip/strategy")
- 5-7: Mixed attributions with some helpful elements
- 1-4: External-Uncontrollable attributions that create helplessness ("The conditions/opponent caused this")

Focus on practical tennis psychology - what will actually help performance on court. Be specific about attribution dimensions and their impact."#
    )
}
