//! Session, pattern and profile records
//!
//! A session is one saved transcript plus its analysis, owned by a single
//! player. Sessions are write-once. Each psychological pattern in the
//! analysis is also stored as its own row so trends can be queried
//! without parsing analysis documents.

use crate::analysis::AnalysisResult;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of tennis session a transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Match,
    #[default]
    Practice,
    Training,
    Reflection,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Match => "match",
            SessionType::Practice => "practice",
            SessionType::Training => "training",
            SessionType::Reflection => "reflection",
        }
    }
}

impl FromStr for SessionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "match" => Ok(SessionType::Match),
            "practice" => Ok(SessionType::Practice),
            "training" => Ok(SessionType::Training),
            "reflection" => Ok(SessionType::Reflection),
            other => Err(Error::InvalidInput(format!("Unknown session type: {}", other))),
        }
    }
}

/// Stored session with full analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub player_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session_type: SessionType,
    pub raw_transcript: String,
    pub analysis_json: AnalysisResult,
    pub helpful_thought_ratio: Option<String>,
    pub average_attribution_quality: Option<f64>,
    pub total_segments: u32,
}

/// Session list row (no transcript or analysis)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session_type: SessionType,
    pub helpful_thought_ratio: Option<String>,
    pub average_attribution_quality: Option<f64>,
    pub total_segments: u32,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            session_type: session.session_type,
            helpful_thought_ratio: session.helpful_thought_ratio.clone(),
            average_attribution_quality: session.average_attribution_quality,
            total_segments: session.total_segments,
        }
    }
}

/// Session about to be saved
#[derive(Debug, Clone)]
pub struct NewSession {
    pub player_id: Uuid,
    pub session_type: SessionType,
    pub raw_transcript: String,
    pub analysis: AnalysisResult,
}

impl NewSession {
    /// Ratio copied from the summary; blank counts as absent
    pub fn helpful_thought_ratio(&self) -> Option<String> {
        let ratio = &self.analysis.analysis_summary.helpful_thought_ratio;
        (!ratio.trim().is_empty()).then(|| ratio.clone())
    }

    pub fn average_attribution_quality(&self) -> Option<f64> {
        self.analysis.analysis_summary.average_attribution_quality
    }

    /// Summary count, falling back to the number of segments
    pub fn total_segments(&self) -> u32 {
        match self.analysis.analysis_summary.total_segments {
            0 => self.analysis.segments.len() as u32,
            n => n,
        }
    }

    /// One pattern row per psychological pattern of every segment
    pub fn patterns(&self) -> Vec<PatternRecord> {
        self.analysis
            .segments
            .iter()
            .flat_map(|segment| {
                segment
                    .psychological_patterns
                    .iter()
                    .map(move |pattern| PatternRecord {
                        pattern_type: pattern.pattern_type.clone(),
                        helpfulness_score: pattern.helpfulness_score,
                        quote: segment.quote.clone(),
                        explanation: pattern.explanation.clone(),
                        intensity: pattern.intensity.clone(),
                        focus_direction: segment.focus_direction.clone(),
                        has_attribution: segment.attribution_analysis.has_attribution,
                        attribution_quality_score: segment
                            .attribution_analysis
                            .attribution_quality_score,
                    })
            })
            .collect()
    }

    /// Materialize the stored session
    pub fn into_session(self, id: Uuid, created_at: DateTime<Utc>) -> Session {
        Session {
            id,
            player_id: self.player_id,
            created_at,
            session_type: self.session_type,
            helpful_thought_ratio: self.helpful_thought_ratio(),
            average_attribution_quality: self.average_attribution_quality(),
            total_segments: self.total_segments(),
            raw_transcript: self.raw_transcript,
            analysis_json: self.analysis,
        }
    }
}

/// Pattern row derived from a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub pattern_type: String,
    pub helpfulness_score: f64,
    pub quote: String,
    pub explanation: String,
    pub intensity: String,
    pub focus_direction: Option<String>,
    pub has_attribution: bool,
    pub attribution_quality_score: Option<f64>,
}

/// Minimal pattern row used for trend aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternPoint {
    pub pattern_type: String,
    pub helpfulness_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePoint {
    pub score: Option<f64>,
    pub date: DateTime<Utc>,
}

/// Per pattern type trend over a time window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternTrend {
    pub count: u32,
    pub total_score: f64,
    /// Rounded to one decimal
    pub average_score: f64,
    pub scores: Vec<ScorePoint>,
}

/// Aggregate pattern rows by type
///
/// Input should be ordered by `created_at` ascending; `scores` keeps that
/// order. Missing scores count as 0 toward the total.
pub fn aggregate_trends(points: &[PatternPoint]) -> BTreeMap<String, PatternTrend> {
    let mut trends: BTreeMap<String, PatternTrend> = BTreeMap::new();

    for point in points {
        let trend = trends
            .entry(point.pattern_type.clone())
            .or_insert_with(|| PatternTrend {
                count: 0,
                total_score: 0.0,
                average_score: 0.0,
                scores: Vec::new(),
            });
        trend.count += 1;
        trend.total_score += point.helpfulness_score.unwrap_or(0.0);
        trend.scores.push(ScorePoint {
            score: point.helpfulness_score,
            date: point.created_at,
        });
    }

    for trend in trends.values_mut() {
        if trend.count > 0 {
            trend.average_score =
                (trend.total_score / f64::from(trend.count) * 10.0).round() / 10.0;
        }
    }

    trends
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Player,
    Coach,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Coach => "coach",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "player" => Ok(Role::Player),
            "coach" => Ok(Role::Coach),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Player profile (id is the auth user id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields a player may change on their own profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: String,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(Error::InvalidInput("full_name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisSummary, AttributionAnalysis, PsychologicalPattern, Segment};
    use chrono::TimeZone;

    fn pattern(kind: &str, score: f64) -> PsychologicalPattern {
        PsychologicalPattern {
            pattern_type: kind.to_string(),
            helpfulness_score: score,
            explanation: "x".to_string(),
            intensity: "low".to_string(),
        }
    }

    fn segment(id: u32, patterns: Vec<PsychologicalPattern>) -> Segment {
        Segment {
            segment_id: id,
            quote: format!("quote {}", id),
            timestamp: None,
            situation: None,
            helpfulness_score: 5.0,
            psychological_patterns: patterns,
            attribution_analysis: AttributionAnalysis {
                has_attribution: true,
                attribution_quality_score: Some(6.0),
                ..Default::default()
            },
            focus_direction: Some("forward".to_string()),
        }
    }

    fn new_session(summary: AnalysisSummary, segments: Vec<Segment>) -> NewSession {
        NewSession {
            player_id: Uuid::new_v4(),
            session_type: SessionType::Match,
            raw_transcript: "text".to_string(),
            analysis: AnalysisResult {
                segments,
                analysis_summary: summary,
            },
        }
    }

    #[test]
    fn test_session_type_parse() {
        assert_eq!("match".parse::<SessionType>().unwrap(), SessionType::Match);
        assert_eq!(SessionType::default().as_str(), "practice");
        assert!(matches!(
            "tournament".parse::<SessionType>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_patterns_flattened_per_segment() {
        let session = new_session(
            AnalysisSummary::default(),
            vec![
                segment(1, vec![pattern("self_criticism", 3.0), pattern("backward_focus", 2.0)]),
                segment(2, vec![]),
                segment(3, vec![pattern("forward_focus", 8.0)]),
            ],
        );

        let patterns = session.patterns();
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[0].quote, "quote 1");
        assert_eq!(patterns[1].pattern_type, "backward_focus");
        assert_eq!(patterns[2].quote, "quote 3");
        assert!(patterns[2].has_attribution);
        assert_eq!(patterns[2].attribution_quality_score, Some(6.0));
    }

    #[test]
    fn test_summary_fields_with_fallbacks() {
        let session = new_session(
            AnalysisSummary::default(),
            vec![segment(1, vec![]), segment(2, vec![])],
        );
        assert_eq!(session.total_segments(), 2);
        assert_eq!(session.helpful_thought_ratio(), None);

        let summary = AnalysisSummary {
            total_segments: 7,
            helpful_thought_ratio: "43%".to_string(),
            average_attribution_quality: Some(6.0),
            ..AnalysisSummary::default()
        };
        let session = new_session(summary, vec![]);
        assert_eq!(session.total_segments(), 7);
        assert_eq!(session.helpful_thought_ratio().as_deref(), Some("43%"));

        let stored = session.into_session(Uuid::new_v4(), Utc::now());
        assert_eq!(stored.total_segments, 7);
        assert_eq!(stored.average_attribution_quality, Some(6.0));
        assert_eq!(SessionSummary::from(&stored).session_type, SessionType::Match);
    }

    #[test]
    fn test_aggregate_trends() {
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap();
        let points = vec![
            PatternPoint {
                pattern_type: "self_criticism".to_string(),
                helpfulness_score: Some(3.0),
                created_at: day(1),
            },
            PatternPoint {
                pattern_type: "forward_focus".to_string(),
                helpfulness_score: Some(8.0),
                created_at: day(2),
            },
            PatternPoint {
                pattern_type: "self_criticism".to_string(),
                helpfulness_score: Some(4.0),
                created_at: day(3),
            },
            PatternPoint {
                pattern_type: "self_criticism".to_string(),
                helpfulness_score: None,
                created_at: day(4),
            },
        ];

        let trends = aggregate_trends(&points);
        assert_eq!(trends.len(), 2);

        let criticism = &trends["self_criticism"];
        assert_eq!(criticism.count, 3);
        assert_eq!(criticism.total_score, 7.0);
        // 7 / 3 = 2.333...
        assert_eq!(criticism.average_score, 2.3);
        assert_eq!(criticism.scores[0].date, day(1));
        assert_eq!(criticism.scores[2].score, None);

        assert_eq!(trends["forward_focus"].average_score, 8.0);
    }

    #[test]
    fn test_profile_update_validation() {
        assert!(ProfileUpdate { full_name: "Rafa".to_string() }.validate().is_ok());
        assert!(ProfileUpdate { full_name: "  ".to_string() }.validate().is_err());
    }
}
