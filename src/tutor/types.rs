use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

pub const DIFFICULTY_MIN: f64 = 1.0;
pub const DIFFICULTY_MAX: f64 = 7.0;
pub const WORKING_MEMORY_MIN: f64 = 3.0;
pub const WORKING_MEMORY_MAX: f64 = 9.0;
pub const PROCESSING_SPEED_MIN: f64 = 1.0;
pub const PROCESSING_SPEED_MAX: f64 = 100.0;
pub const PERSISTENCE_MIN: f64 = 1.0;
pub const PERSISTENCE_MAX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum AgeGroup {
    Elementary,
    #[default]
    Middle,
    HighSchool,
}

impl AgeGroup {
    pub fn from_class_level(class_level: u8) -> Self {
        match class_level {
            0..=6 => Self::Elementary,
            7..=9 => Self::Middle,
            _ => Self::HighSchool,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elementary => "elementary",
            Self::Middle => "middle",
            Self::HighSchool => "high_school",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "elementary" => Self::Elementary,
            "high_school" | "highschool" => Self::HighSchool,
            _ => Self::Middle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum CognitiveStyle {
    Impulsive,
    Reflective,
    Persistent,
    Minimalist,
    #[default]
    Optimistic,
}

impl CognitiveStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impulsive => "impulsive",
            Self::Reflective => "reflective",
            Self::Persistent => "persistent",
            Self::Minimalist => "minimalist",
            Self::Optimistic => "optimistic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ExplanationStyle {
    Visual,
    Verbal,
    #[default]
    StepByStep,
}

impl ExplanationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Verbal => "verbal",
            Self::StepByStep => "step_by_step",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "visual" => Self::Visual,
            "verbal" => Self::Verbal,
            _ => Self::StepByStep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePattern {
    QuickCorrect,
    SlowCorrect,
    HesitantCorrect,
    ComputationalError,
    MethodError,
    CompletelyLost,
    PseudoActivity,
}

impl ResponsePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickCorrect => "quick_correct",
            Self::SlowCorrect => "slow_correct",
            Self::HesitantCorrect => "hesitant_correct",
            Self::ComputationalError => "computational_error",
            Self::MethodError => "method_error",
            Self::CompletelyLost => "completely_lost",
            Self::PseudoActivity => "pseudo_activity",
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(
            self,
            Self::QuickCorrect | Self::SlowCorrect | Self::HesitantCorrect
        )
    }

    /// Incorrect answers that reflect an actual attempt at the problem.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ComputationalError | Self::MethodError | Self::CompletelyLost
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ScaffoldingPhase {
    #[default]
    TheoryIntroduction,
    WorkedExample,
    GuidedPractice,
    IndependentPractice,
    MasteryCheck,
}

impl ScaffoldingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TheoryIntroduction => "theory_introduction",
            Self::WorkedExample => "worked_example",
            Self::GuidedPractice => "guided_practice",
            Self::IndependentPractice => "independent_practice",
            Self::MasteryCheck => "mastery_check",
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::TheoryIntroduction => Some(Self::WorkedExample),
            Self::WorkedExample => Some(Self::GuidedPractice),
            Self::GuidedPractice => Some(Self::IndependentPractice),
            Self::IndependentPractice => Some(Self::MasteryCheck),
            Self::MasteryCheck => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentType {
    Praise,
    Correction,
    Hint,
    Encouragement,
    PrerequisiteCheck,
    Checkpoint,
    Intervention,
}

impl MomentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Praise => "praise",
            Self::Correction => "correction",
            Self::Hint => "hint",
            Self::Encouragement => "encouragement",
            Self::PrerequisiteCheck => "prerequisite_check",
            Self::Checkpoint => "checkpoint",
            Self::Intervention => "intervention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    IncreaseDifficulty,
    Continue,
    PracticeMore,
    ReviewBasics,
    PrerequisiteReview,
    BreakSuggestion,
    ContextChange,
    Review,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncreaseDifficulty => "increase_difficulty",
            Self::Continue => "continue",
            Self::PracticeMore => "practice_more",
            Self::ReviewBasics => "review_basics",
            Self::PrerequisiteReview => "prerequisite_review",
            Self::BreakSuggestion => "break_suggestion",
            Self::ContextChange => "context_change",
            Self::Review => "review",
        }
    }

    pub fn is_remedial(&self) -> bool {
        matches!(self, Self::ReviewBasics | Self::PrerequisiteReview)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Frustrated,
    Bored,
    Confident,
    Uncertain,
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frustrated => "frustrated",
            Self::Bored => "bored",
            Self::Confident => "confident",
            Self::Uncertain => "uncertain",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum TrendState {
    Up,
    #[default]
    Flat,
    Down,
}

impl TrendState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Flat => "flat",
            Self::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub engagement: f64,
    pub frustration: f64,
    pub perceived_challenge: f64,
    pub cognitive_load: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub timestamp: i64,
    pub response_time: f64,
    pub is_correct: bool,
    pub strategy: String,
    pub difficulty_adjustment: f64,
    pub flow_snapshot: FlowSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<ResponsePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakConditions {
    pub response_time: ValueRange,
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningPatterns {
    pub consistency: f64,
    pub improvement_trend: f64,
    pub optimal_difficulty_range: Option<ValueRange>,
    pub preferred_strategies: Vec<String>,
    pub peak_performance_conditions: Option<PeakConditions>,
}

impl Default for LearningPatterns {
    fn default() -> Self {
        Self {
            consistency: 0.5,
            improvement_trend: 0.0,
            optimal_difficulty_range: None,
            preferred_strategies: vec![],
            peak_performance_conditions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceTrends {
    pub weekly_trend: f64,
    pub monthly_trend: f64,
    pub trend: TrendState,
    pub current_streak: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhaseState {
    pub phase: ScaffoldingPhase,
    pub recent_outcomes: VecDeque<bool>,
    pub consecutive_correct: u32,
    pub mastered: bool,
    pub entered_at: i64,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            phase: ScaffoldingPhase::TheoryIntroduction,
            recent_outcomes: VecDeque::new(),
            consecutive_correct: 0,
            mastered: false,
            entered_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl PhaseState {
    pub fn accuracy(&self) -> f64 {
        if self.recent_outcomes.is_empty() {
            return 0.0;
        }
        let correct = self.recent_outcomes.iter().filter(|c| **c).count();
        correct as f64 / self.recent_outcomes.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub average_response_time: f64,
    pub correctness_rate: f64,
    pub common_mistakes: BTreeSet<String>,
    pub knowledge_gaps: BTreeSet<String>,
    pub preferred_explanation_style: ExplanationStyle,
    pub difficulty_level: f64,
    pub working_memory_capacity: f64,
    pub processing_speed: f64,
    pub attention_regulation_index: f64,
    pub inhibitory_control_index: f64,
    pub cognitive_flexibility_index: f64,
    pub self_efficacy: f64,
    pub persistence_index: f64,
    pub age_group: AgeGroup,
    pub class_level: u8,
    pub attention_span_minutes: u32,
    pub cognitive_style: CognitiveStyle,
    pub active_misconceptions: BTreeSet<String>,
    pub recent_emotions: VecDeque<Emotion>,
    pub recent_sessions: VecDeque<SessionRecord>,
    pub learning_patterns: LearningPatterns,
    pub performance_trends: PerformanceTrends,
    pub consecutive_correct: u32,
    pub consecutive_incorrect: u32,
    pub pseudo_activity_streak: u32,
    pub interaction_count: u64,
    pub scaffolding: BTreeMap<String, PhaseState>,
}

impl Default for StudentProfile {
    fn default() -> Self {
        Self {
            average_response_time: 6000.0,
            correctness_rate: 0.5,
            common_mistakes: BTreeSet::new(),
            knowledge_gaps: BTreeSet::new(),
            preferred_explanation_style: ExplanationStyle::default(),
            difficulty_level: 3.0,
            working_memory_capacity: 5.5,
            processing_speed: 50.0,
            attention_regulation_index: 0.5,
            inhibitory_control_index: 0.5,
            cognitive_flexibility_index: 0.2,
            self_efficacy: 0.5,
            persistence_index: 3.0,
            age_group: AgeGroup::Middle,
            class_level: 7,
            attention_span_minutes: 15,
            cognitive_style: CognitiveStyle::default(),
            active_misconceptions: BTreeSet::new(),
            recent_emotions: VecDeque::new(),
            recent_sessions: VecDeque::new(),
            learning_patterns: LearningPatterns::default(),
            performance_trends: PerformanceTrends::default(),
            consecutive_correct: 0,
            consecutive_incorrect: 0,
            pseudo_activity_streak: 0,
            interaction_count: 0,
            scaffolding: BTreeMap::new(),
        }
    }
}

impl StudentProfile {
    /// Clamps every bounded field into its documented domain.
    pub fn normalize(&mut self) {
        self.average_response_time = finite_or(self.average_response_time, 6000.0).max(0.0);
        self.correctness_rate = clamp_unit(self.correctness_rate);
        self.difficulty_level =
            finite_or(self.difficulty_level, 3.0).clamp(DIFFICULTY_MIN, DIFFICULTY_MAX);
        self.working_memory_capacity = finite_or(self.working_memory_capacity, 5.5)
            .clamp(WORKING_MEMORY_MIN, WORKING_MEMORY_MAX);
        self.processing_speed = finite_or(self.processing_speed, 50.0)
            .clamp(PROCESSING_SPEED_MIN, PROCESSING_SPEED_MAX);
        self.attention_regulation_index = clamp_unit(self.attention_regulation_index);
        self.inhibitory_control_index = clamp_unit(self.inhibitory_control_index);
        self.cognitive_flexibility_index = clamp_unit(self.cognitive_flexibility_index);
        self.self_efficacy = clamp_unit(self.self_efficacy);
        self.persistence_index =
            finite_or(self.persistence_index, 3.0).clamp(PERSISTENCE_MIN, PERSISTENCE_MAX);
    }

    pub fn set_difficulty_level(&mut self, value: f64) {
        self.difficulty_level = finite_or(value, self.difficulty_level)
            .clamp(DIFFICULTY_MIN, DIFFICULTY_MAX);
    }

    pub fn phase_for(&self, skill_id: &str) -> ScaffoldingPhase {
        self.scaffolding
            .get(skill_id)
            .map(|s| s.phase)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStateIndicators {
    pub response_time_variance: f64,
    pub error_stability_index: f64,
    pub self_correction_frequency: f64,
    pub perceived_challenge: f64,
    pub engagement_level: f64,
    pub frustration_level: f64,
    pub cognitive_load: f64,
}

impl FlowStateIndicators {
    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            engagement: self.engagement_level,
            frustration: self.frustration_level,
            perceived_challenge: self.perceived_challenge,
            cognitive_load: self.cognitive_load,
        }
    }
}

/// Session-level affect on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalState {
    pub frustration: f64,
    pub engagement: f64,
    pub confidence: f64,
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self {
            frustration: 0.0,
            engagement: 70.0,
            confidence: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingMoment {
    #[serde(rename = "type")]
    pub kind: MomentType,
    pub message: String,
    pub notes: Vec<String>,
    pub next_action: NextAction,
    pub focus_areas: BTreeSet<String>,
    pub difficulty_adjustment: f64,
    pub generate_more_problems: u32,
    pub ask_confidence_rating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PhaseTransition {
    Stay,
    Advanced {
        from: ScaffoldingPhase,
        to: ScaffoldingPhase,
    },
    Mastered,
    Regressed {
        from: ScaffoldingPhase,
        to: ScaffoldingPhase,
    },
}

/// One answer submitted by the learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub skill_id: String,
    pub user_answer: String,
    pub expected_answer: String,
    pub response_time_ms: f64,
    pub is_correct: bool,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub time_pressure: bool,
    #[serde(default)]
    pub self_reported_confidence: Option<u8>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnippet {
    pub age_group: AgeGroup,
    pub preferred_explanation_style: ExplanationStyle,
    pub cognitive_style: CognitiveStyle,
    pub difficulty_level: f64,
    pub recent_emotions: Vec<Emotion>,
    pub knowledge_gaps: Vec<String>,
    pub active_misconceptions: Vec<String>,
}

impl ProfileSnippet {
    pub fn from_profile(profile: &StudentProfile) -> Self {
        Self {
            age_group: profile.age_group,
            preferred_explanation_style: profile.preferred_explanation_style,
            cognitive_style: profile.cognitive_style,
            difficulty_level: profile.difficulty_level,
            recent_emotions: profile.recent_emotions.iter().copied().collect(),
            knowledge_gaps: profile.knowledge_gaps.iter().cloned().collect(),
            active_misconceptions: profile.active_misconceptions.iter().cloned().collect(),
        }
    }
}

/// Handed to the reply-generation collaborator; carries decisions only, never prose.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseContext {
    pub teaching_moment: TeachingMoment,
    pub flow_summary: FlowSnapshot,
    pub emotional_state: EmotionalState,
    pub profile_snippet: ProfileSnippet,
}

/// Where the task sat relative to the learner's zone of proximal development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZpdZone {
    TooEasy,
    Within,
    TooHard,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionOutcome {
    pub interaction_id: String,
    pub pattern: ResponsePattern,
    pub confidence: f64,
    pub flow: FlowStateIndicators,
    pub emotional_state: EmotionalState,
    pub zpd_alignment: f64,
    pub zpd_zone: ZpdZone,
    pub phase: ScaffoldingPhase,
    pub phase_transition: PhaseTransition,
    pub teaching_moment: TeachingMoment,
    pub profile: StudentProfile,
    pub response_context: ResponseContext,
    pub version: i64,
}

pub fn clamp_unit(value: f64) -> f64 {
    finite_or(value, 0.5).clamp(0.0, 1.0)
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
