use crate::tutor::config::EmotionParams;
use crate::tutor::types::{
    Emotion, EmotionalState, FlowStateIndicators, ResponsePattern, StudentProfile,
};

pub struct EmotionInput<'a> {
    pub profile: &'a StudentProfile,
    pub flow: &'a FlowStateIndicators,
    pub pattern: ResponsePattern,
    pub time_pressure: bool,
    /// Learner's own rating on a 1-10 scale, when asked.
    pub self_reported_confidence: Option<u8>,
}

pub struct EmotionEstimator {
    params: EmotionParams,
}

impl EmotionEstimator {
    pub fn new(params: EmotionParams) -> Self {
        Self { params }
    }

    /// Session-level affect, 0-100. Expects the profile counters to already
    /// include the current answer.
    pub fn estimate(&self, input: &EmotionInput<'_>) -> EmotionalState {
        let p = &self.params;
        let profile = input.profile;

        let streak_component =
            (profile.consecutive_incorrect as f64 * p.incorrect_step).min(p.incorrect_cap);
        let pressure_component = if input.time_pressure {
            p.time_pressure_penalty
        } else {
            0.0
        };
        let correctness_component = if profile.correctness_rate < p.low_correctness_threshold {
            p.low_correctness_penalty
        } else {
            0.0
        };
        let session_frustration =
            (streak_component + pressure_component + correctness_component).clamp(0.0, 100.0);
        let frustration = session_frustration.max(input.flow.frustration_level * 100.0);

        let engagement = (input.flow.engagement_level * 100.0
            - profile.pseudo_activity_streak as f64 * p.pseudo_engagement_penalty)
            .clamp(0.0, 100.0);

        let confidence = match input.self_reported_confidence {
            Some(rating) => (rating.clamp(1, 10) as f64) * 10.0,
            None => {
                let hesitation = if input.pattern == ResponsePattern::HesitantCorrect {
                    p.hesitation_penalty
                } else {
                    0.0
                };
                (p.confidence_base + profile.consecutive_correct as f64 * p.confidence_step
                    - profile.consecutive_incorrect as f64 * p.confidence_step
                    - hesitation)
                    .clamp(0.0, 100.0)
            }
        };

        EmotionalState {
            frustration: frustration.clamp(0.0, 100.0),
            engagement,
            confidence,
        }
    }
}

impl Default for EmotionEstimator {
    fn default() -> Self {
        Self::new(EmotionParams::default())
    }
}

pub fn dominant_emotion(state: &EmotionalState, pattern: ResponsePattern) -> Emotion {
    if state.frustration >= 70.0 {
        Emotion::Frustrated
    } else if state.engagement < 40.0 {
        Emotion::Bored
    } else if state.confidence >= 70.0 {
        Emotion::Confident
    } else if pattern == ResponsePattern::HesitantCorrect {
        Emotion::Uncertain
    } else {
        Emotion::Neutral
    }
}
