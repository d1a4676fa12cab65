//! Emotional Tennis Framework
//!
//! Fixed table of six on-court emotions placed on the circumplex model
//! (arousal x valence), the peak performance zone, reset strategies by
//! energy level and the towel reset ritual. Detection is a plain
//! case-insensitive trigger phrase lookup.
//!
//! All serialized output uses camelCase keys to match what the web client
//! consumes.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Output language for names and actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    /// Resolve a request language code
    ///
    /// Absent or blank codes fall back to Spanish. Any code other than
    /// "es" selects English.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            None | Some("") | Some("es") => Language::Es,
            Some(_) => Language::En,
        }
    }
}

/// One emotion record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Emotion {
    #[serde(skip)]
    pub key: &'static str,
    pub name: &'static str,
    pub name_es: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub gradient: &'static str,
    /// Energy level, 1-10
    pub arousal: u8,
    /// Pleasantness, 1-10
    pub valence: u8,
    pub timeline: &'static str,
    pub ego: &'static str,
    pub controllability: &'static str,
    pub danger: &'static str,
    pub description: &'static str,
    pub description_es: &'static str,
    pub trigger_phrases: &'static [&'static str],
    pub reset_action: &'static str,
    pub reset_action_es: &'static str,
}

impl Emotion {
    fn name_in(&self, lang: Language) -> &'static str {
        match lang {
            Language::Es => self.name_es,
            Language::En => self.name,
        }
    }

    fn reset_action_in(&self, lang: Language) -> &'static str {
        match lang {
            Language::Es => self.reset_action_es,
            Language::En => self.reset_action,
        }
    }
}

/// Ordered emotion table, serialized as an object keyed by emotion
#[derive(Debug)]
pub struct EmotionTable(pub &'static [Emotion]);

impl Serialize for EmotionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|e| (e.key, e)))
    }
}

pub static EMOTIONS: &[Emotion] = &[
    Emotion {
        key: "disappointment",
        name: "Disappointment",
        name_es: "Decepcion",
        icon: "😞",
        color: "#6B7280",
        gradient: "linear-gradient(135deg, #6B7280 0%, #4B5563 100%)",
        arousal: 3,
        valence: 2,
        timeline: "Past",
        ego: "Ego-Threatened",
        controllability: "Internal + Uncontrollable",
        danger: "Critical",
        description: "Low energy withdrawal from challenge",
        description_es: "Retirada de baja energia del desafio",
        trigger_phrases: &[
            "no puedo",
            "es imposible",
            "ya no",
            "me rindo",
            "para que",
            "no sirve",
            "no vale la pena",
            "siempre pierdo",
            "nunca gano",
            "i can't",
            "it's hopeless",
            "what's the point",
            "i give up",
        ],
        reset_action: "Jump, pump your fist, stand tall",
        reset_action_es: "Salta, levanta el puno, mantente erguido",
    },
    Emotion {
        key: "frustration",
        name: "Frustration",
        name_es: "Frustracion",
        icon: "😤",
        color: "#F59E0B",
        gradient: "linear-gradient(135deg, #F59E0B 0%, #D97706 100%)",
        arousal: 6,
        valence: 3,
        timeline: "Past/Present",
        ego: "Task → Ego-Pressured",
        controllability: "Internal + Controllable",
        danger: "Moderate",
        description: "Productive tension seeking solution",
        description_es: "Tension productiva buscando solucion",
        trigger_phrases: &[
            "otra vez",
            "joder",
            "mierda",
            "vamos",
            "por que",
            "como es posible",
            "tengo que",
            "no puede ser",
            "venga ya",
            "pero si lo se hacer",
            "come on",
            "again",
            "why",
            "i know how to do this",
        ],
        reset_action: "Pick ONE thing to focus on",
        reset_action_es: "Elige UNA cosa en la que enfocarte",
    },
    Emotion {
        key: "anger",
        name: "Anger",
        name_es: "Rabia",
        icon: "😠",
        color: "#EF4444",
        gradient: "linear-gradient(135deg, #EF4444 0%, #DC2626 100%)",
        arousal: 8,
        valence: 2,
        timeline: "Past/Present",
        ego: "Ego-Defensive",
        controllability: "Internal + Uncontrollable",
        danger: "Moderate-High",
        description: "Explosive reaction to perceived injustice",
        description_es: "Reaccion explosiva a injusticia percibida",
        trigger_phrases: &[
            "es una mierda",
            "me cago",
            "hostia",
            "puta",
            "injusto",
            "no es justo",
            "trampa",
            "esta ciego",
            "el arbitro",
            "this is bullshit",
            "unfair",
            "cheating",
            "blind ref",
        ],
        reset_action: "Walk to towel, breathe deep",
        reset_action_es: "Camina a la toalla, respira profundo",
    },
    Emotion {
        key: "anxiety",
        name: "Anxiety",
        name_es: "Ansiedad",
        icon: "😰",
        color: "#8B5CF6",
        gradient: "linear-gradient(135deg, #8B5CF6 0%, #7C3AED 100%)",
        arousal: 7,
        valence: 3,
        timeline: "Future",
        ego: "Ego-Pressured",
        controllability: "Internal + Uncontrollable",
        danger: "High",
        description: "Anticipatory fear of failure",
        description_es: "Miedo anticipatorio al fracaso",
        trigger_phrases: &[
            "y si pierdo",
            "que van a pensar",
            "no puedo fallar",
            "tengo que ganar",
            "si fallo",
            "me van a ver",
            "estoy nervioso",
            "what if",
            "they're watching",
            "i have to win",
            "i'm nervous",
        ],
        reset_action: "Walk to towel, breathe deep",
        reset_action_es: "Camina a la toalla, respira profundo",
    },
    Emotion {
        key: "calmness",
        name: "Calmness",
        name_es: "Calma",
        icon: "😌",
        color: "#3B82F6",
        gradient: "linear-gradient(135deg, #3B82F6 0%, #2563EB 100%)",
        arousal: 4,
        valence: 7,
        timeline: "Present",
        ego: "Task-Focused",
        controllability: "Internal + Controllable",
        danger: "Low",
        description: "Centered presence and clarity",
        description_es: "Presencia centrada y claridad",
        trigger_phrases: &[
            "tranquilo",
            "respira",
            "uno a uno",
            "punto a punto",
            "esta bien",
            "sin prisa",
            "calma",
            "enfocate",
            "stay calm",
            "breathe",
            "one point at a time",
            "focus",
        ],
        reset_action: "Stay in the moment, trust it",
        reset_action_es: "Mantente en el momento, confía",
    },
    Emotion {
        key: "excitement",
        name: "Excitement",
        name_es: "Entusiasmo",
        icon: "😄",
        color: "#10B981",
        gradient: "linear-gradient(135deg, #10B981 0%, #059669 100%)",
        arousal: 7,
        valence: 8,
        timeline: "Present/Future",
        ego: "Task-Focused",
        controllability: "Internal + Controllable",
        danger: "Low",
        description: "Energized engagement with challenge",
        description_es: "Compromiso energizado con el desafio",
        trigger_phrases: &[
            "vamos",
            "eso es",
            "grande",
            "si",
            "bien",
            "perfecto",
            "genial",
            "increible",
            "a por el",
            "lo tengo",
            "yes",
            "let's go",
            "amazing",
            "perfect",
            "i got this",
        ],
        reset_action: "Stay in the moment, trust it",
        reset_action_es: "Mantente en el momento, confía",
    },
];

/// Peak performance zone (IZOF)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakZone {
    pub arousal_min: u8,
    pub arousal_max: u8,
    pub valence_min: u8,
    pub valence_max: u8,
    pub description: &'static str,
    pub target_emotions: &'static [&'static str],
}

pub static PEAK_ZONE: PeakZone = PeakZone {
    arousal_min: 4,
    arousal_max: 7,
    valence_min: 5,
    valence_max: 10,
    description: "Optimal arousal with positive emotions",
    target_emotions: &["calmness", "excitement"],
};

#[derive(Debug, Serialize)]
pub struct Insight {
    pub emotion: &'static str,
    pub reason: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInsights {
    pub watch_out: Insight,
    pub target_zone: Insight,
    pub act_fast: Insight,
}

pub static KEY_INSIGHTS: KeyInsights = KeyInsights {
    watch_out: Insight {
        emotion: "Disappointment",
        reason: "It makes you want to give up",
        color: "#EF4444",
    },
    target_zone: Insight {
        emotion: "Calm + Excited",
        reason: "This is where you play your best",
        color: "#10B981",
    },
    act_fast: Insight {
        emotion: "Frustration Building",
        reason: "You have 2-3 points to reset",
        color: "#F59E0B",
    },
};

/// Reset strategy for an arousal range (inclusive)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetStrategy {
    #[serde(skip)]
    pub key: &'static str,
    pub range: [u8; 2],
    pub label: &'static str,
    pub actions: &'static [&'static str],
    pub actions_es: &'static [&'static str],
}

impl ResetStrategy {
    fn contains(&self, arousal: u8) -> bool {
        arousal >= self.range[0] && arousal <= self.range[1]
    }
}

/// Ordered strategy table, serialized as an object keyed by energy level
#[derive(Debug)]
pub struct ResetStrategies(pub &'static [ResetStrategy]);

impl Serialize for ResetStrategies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|s| (s.key, s)))
    }
}

pub static RESET_STRATEGIES: &[ResetStrategy] = &[
    ResetStrategy {
        key: "lowEnergy",
        range: [1, 3],
        label: "Energy Too Low",
        actions: &[
            "Jump up and down, pump your fist",
            "Stand tall with power pose",
            "Say something strong to yourself",
            "Quick feet, stay moving",
            "Deep breath OUT with energy",
        ],
        actions_es: &[
            "Salta, levanta el puno",
            "Mantente erguido con postura de poder",
            "Dite algo fuerte a ti mismo",
            "Pies rapidos, sigue moviendote",
            "Respira profundo HACIA FUERA con energia",
        ],
    },
    ResetStrategy {
        key: "optimalEnergy",
        range: [4, 7],
        label: "Optimal Zone",
        actions: &[
            "Maintain your rhythm",
            "Stay present focused",
            "Trust your preparation",
        ],
        actions_es: &[
            "Mantén tu ritmo",
            "Permanece enfocado en el presente",
            "Confía en tu preparación",
        ],
    },
    ResetStrategy {
        key: "highEnergy",
        range: [8, 10],
        label: "Energy Too High",
        actions: &[
            "Walk to your towel (take your time)",
            "Diaphragmatic breathing (belly expands)",
            "Tighten muscles, then relax",
            "Soft eyes, drop your shoulders",
            "Deal with the emotion, then let it go",
        ],
        actions_es: &[
            "Camina a tu toalla (tomate tu tiempo)",
            "Respiracion diafragmatica (expande el abdomen)",
            "Tensa los musculos, luego relajalos",
            "Ojos suaves, baja los hombros",
            "Acepta la emocion, luego dejala ir",
        ],
    },
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TowelStep {
    pub step: &'static str,
    pub text: &'static str,
    pub text_es: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TowelReset {
    pub steps: &'static [TowelStep],
}

pub static TOWEL_RESET: TowelReset = TowelReset {
    steps: &[
        TowelStep { step: "1", text: "Walk slowly to towel", text_es: "Camina lento a la toalla" },
        TowelStep { step: "2", text: "Wipe face deliberately", text_es: "Limpia la cara deliberadamente" },
        TowelStep { step: "3", text: "Deep belly breaths", text_es: "Respiraciones profundas de barriga" },
        TowelStep { step: "4", text: "Let the emotion go", text_es: "Deja ir la emocion" },
        TowelStep { step: "5", text: "Back to present", text_es: "Vuelve al presente" },
    ],
};

/// Danger levels counted as danger moments in a trajectory
const DANGER_LEVELS: [&str; 3] = ["Critical", "High", "Moderate-High"];

/// Full framework payload for `GET /api/emotions`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkConfig {
    pub emotions: EmotionTable,
    pub peak_zone: &'static PeakZone,
    pub key_insights: &'static KeyInsights,
    pub reset_strategies: ResetStrategies,
    pub towel_reset: &'static TowelReset,
}

pub fn framework_config() -> FrameworkConfig {
    FrameworkConfig {
        emotions: EmotionTable(EMOTIONS),
        peak_zone: &PEAK_ZONE,
        key_insights: &KEY_INSIGHTS,
        reset_strategies: ResetStrategies(RESET_STRATEGIES),
        towel_reset: &TOWEL_RESET,
    }
}

/// One emotion matched in a statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedEmotion {
    pub emotion: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    /// 30 points per matched phrase, capped at 100
    pub confidence: u32,
    pub matched_phrases: Vec<&'static str>,
    pub arousal: u8,
    pub valence: u8,
    pub danger: &'static str,
    pub timeline: &'static str,
    pub reset_action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionDetection {
    pub detected: Vec<DetectedEmotion>,
    pub primary_emotion: Option<DetectedEmotion>,
    pub is_in_peak_zone: bool,
    pub recommended_action: &'static str,
}

/// Detect emotions in a statement by trigger phrase
pub fn detect_emotions(text: &str, lang: Language) -> EmotionDetection {
    let lower = text.to_lowercase();

    let mut detected: Vec<DetectedEmotion> = EMOTIONS
        .iter()
        .filter_map(|emotion| {
            let matched_phrases: Vec<&'static str> = emotion
                .trigger_phrases
                .iter()
                .copied()
                .filter(|phrase| lower.contains(&phrase.to_lowercase()))
                .collect();

            if matched_phrases.is_empty() {
                return None;
            }

            let confidence = (matched_phrases.len() as u32 * 30).min(100);
            Some(DetectedEmotion {
                emotion: emotion.key,
                name: emotion.name_in(lang),
                icon: emotion.icon,
                color: emotion.color,
                confidence,
                matched_phrases,
                arousal: emotion.arousal,
                valence: emotion.valence,
                danger: emotion.danger,
                timeline: emotion.timeline,
                reset_action: emotion.reset_action_in(lang),
            })
        })
        .collect();

    // Stable: ties keep table order
    detected.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    let primary = detected.first().cloned();
    let is_in_peak_zone = primary.as_ref().map_or(false, in_peak_zone);
    let recommended_action = recommended_action(primary.as_ref(), lang);

    EmotionDetection {
        detected,
        primary_emotion: primary,
        is_in_peak_zone,
        recommended_action,
    }
}

fn in_peak_zone(emotion: &DetectedEmotion) -> bool {
    emotion.arousal >= PEAK_ZONE.arousal_min
        && emotion.arousal <= PEAK_ZONE.arousal_max
        && emotion.valence >= PEAK_ZONE.valence_min
}

fn recommended_action(emotion: Option<&DetectedEmotion>, lang: Language) -> &'static str {
    let Some(emotion) = emotion else {
        return match lang {
            Language::Es => "Mantente presente y enfocado en el siguiente punto",
            Language::En => "Stay present and focused on the next point",
        };
    };

    RESET_STRATEGIES
        .iter()
        .find(|s| s.contains(emotion.arousal))
        .and_then(|s| match lang {
            Language::Es => s.actions_es.first(),
            Language::En => s.actions.first(),
        })
        .copied()
        .unwrap_or(emotion.reset_action)
}

/// Trajectory input: plain string or `{ "text": ... }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Statement {
    Text(String),
    Object {
        #[serde(default)]
        text: String,
    },
}

impl Statement {
    pub fn text(&self) -> &str {
        match self {
            Statement::Text(text) => text,
            Statement::Object { text } => text,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryPoint {
    pub index: usize,
    pub statement: String,
    #[serde(flatten)]
    pub analysis: EmotionDetection,
}

/// Primary-emotion counts in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionDistribution(pub Vec<(&'static str, u32)>);

impl EmotionDistribution {
    fn record(&mut self, emotion: &'static str) {
        match self.0.iter_mut().find(|(key, _)| *key == emotion) {
            Some((_, count)) => *count += 1,
            None => self.0.push((emotion, 1)),
        }
    }

    /// Most frequent emotion, earliest seen wins ties
    fn dominant(&self) -> Option<&'static str> {
        let mut best: Option<(&'static str, u32)> = None;
        for &(key, count) in &self.0 {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        best.map(|(key, _)| key)
    }
}

impl Serialize for EmotionDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, count) in &self.0 {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectorySummary {
    pub dominant_emotion: Option<&'static str>,
    pub emotion_distribution: EmotionDistribution,
    pub average_arousal: Option<f64>,
    pub average_valence: Option<f64>,
    pub peak_zone_percentage: u32,
    pub danger_moments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    pub trajectory: Vec<TrajectoryPoint>,
    pub summary: TrajectorySummary,
}

/// Run detection over a sequence of statements and summarize
pub fn analyze_trajectory(statements: &[Statement], lang: Language) -> Trajectory {
    let trajectory: Vec<TrajectoryPoint> = statements
        .iter()
        .enumerate()
        .map(|(index, statement)| TrajectoryPoint {
            index,
            statement: statement.text().to_string(),
            analysis: detect_emotions(statement.text(), lang),
        })
        .collect();

    let mut distribution = EmotionDistribution::default();
    let mut total_arousal = 0u32;
    let mut total_valence = 0u32;
    let mut with_emotion = 0u32;
    let mut danger_moments = 0usize;

    for point in &trajectory {
        if let Some(primary) = &point.analysis.primary_emotion {
            distribution.record(primary.emotion);
            total_arousal += u32::from(primary.arousal);
            total_valence += u32::from(primary.valence);
            with_emotion += 1;
            if DANGER_LEVELS.contains(&primary.danger) {
                danger_moments += 1;
            }
        }
    }

    let average = |total: u32| {
        (with_emotion > 0).then(|| round1(f64::from(total) / f64::from(with_emotion)))
    };

    let in_zone = trajectory.iter().filter(|p| p.analysis.is_in_peak_zone).count();
    let peak_zone_percentage = if trajectory.is_empty() {
        0
    } else {
        ((in_zone as f64 / trajectory.len() as f64) * 100.0).round() as u32
    };

    let summary = TrajectorySummary {
        dominant_emotion: distribution.dominant(),
        average_arousal: average(total_arousal),
        average_valence: average(total_valence),
        emotion_distribution: distribution,
        peak_zone_percentage,
        danger_moments,
    };

    Trajectory {
        trajectory,
        summary,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
