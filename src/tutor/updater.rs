use crate::tutor::config::{AgeProfiles, BuilderParams, UpdaterParams};
use crate::tutor::modeling::emotion::dominant_emotion;
use crate::tutor::modeling::profile_builder::{derive_cognitive_style, processing_speed_from_response};
use crate::tutor::modeling::trend;
use crate::tutor::types::{
    clamp_unit, EmotionalState, FlowStateIndicators, PhaseTransition, ResponsePattern,
    SessionRecord, StudentProfile,
};

/// Everything the fold needs to know about one finished interaction.
#[derive(Debug, Clone)]
pub struct InteractionRecord<'a> {
    pub skill_id: &'a str,
    pub timestamp: i64,
    pub response_time_ms: f64,
    pub is_correct: bool,
    pub pattern: ResponsePattern,
    pub strategy: &'a str,
    pub quick_threshold: f64,
    pub flow: &'a FlowStateIndicators,
    pub emotional: &'a EmotionalState,
    pub difficulty_adjustment: f64,
    pub phase_transition: PhaseTransition,
    pub misconception: Option<&'a str>,
}

pub fn ema(previous: f64, observation: f64, alpha: f64) -> f64 {
    alpha * observation + (1.0 - alpha) * previous
}

pub struct ProfileUpdater {
    params: UpdaterParams,
    age: AgeProfiles,
    builder: BuilderParams,
}

impl ProfileUpdater {
    pub fn new(params: UpdaterParams, age: AgeProfiles, builder: BuilderParams) -> Self {
        Self {
            params,
            age,
            builder,
        }
    }

    /// Streak counters, applied before the emotion estimate and the decision
    /// so both see the current answer.
    pub fn record_outcome(&self, profile: &mut StudentProfile, is_correct: bool, pattern: ResponsePattern) {
        if is_correct {
            profile.consecutive_correct = profile.consecutive_correct.saturating_add(1);
            profile.consecutive_incorrect = 0;
        } else {
            profile.consecutive_incorrect = profile.consecutive_incorrect.saturating_add(1);
            profile.consecutive_correct = 0;
        }
        if pattern == ResponsePattern::PseudoActivity {
            profile.pseudo_activity_streak = profile.pseudo_activity_streak.saturating_add(1);
        } else {
            profile.pseudo_activity_streak = 0;
        }
    }

    pub fn apply(&self, profile: &mut StudentProfile, record: &InteractionRecord<'_>) {
        let alpha = self.params.ema_alpha;
        let age = self.age.for_group(profile.age_group);
        let rt = if record.response_time_ms.is_finite() {
            record.response_time_ms.max(0.0)
        } else {
            profile.average_response_time
        };

        profile.average_response_time = ema(profile.average_response_time, rt, alpha);
        profile.correctness_rate = ema(
            profile.correctness_rate,
            if record.is_correct { 1.0 } else { 0.0 },
            alpha,
        );
        profile.processing_speed = ema(
            profile.processing_speed,
            processing_speed_from_response(age, rt),
            alpha,
        );
        profile.attention_regulation_index = ema(
            profile.attention_regulation_index,
            1.0 - record.flow.response_time_variance,
            alpha,
        );

        let impulsive = record.pattern == ResponsePattern::PseudoActivity
            || (!record.is_correct && rt < record.quick_threshold);
        profile.inhibitory_control_index = ema(
            profile.inhibitory_control_index,
            if impulsive { 0.0 } else { 1.0 },
            alpha,
        );
        profile.self_efficacy = ema(profile.self_efficacy, efficacy_observation(record.pattern), alpha);

        let persistence_observation = match record.pattern {
            ResponsePattern::CompletelyLost | ResponsePattern::PseudoActivity => 1.0,
            _ => 1.0 + 4.0 * clamp_unit(record.flow.engagement_level),
        };
        profile.persistence_index = ema(profile.persistence_index, persistence_observation, alpha);

        let wm_observation = age.working_memory_baseline * (0.8 + 0.4 * profile.correctness_rate);
        profile.working_memory_capacity = ema(profile.working_memory_capacity, wm_observation, alpha);

        profile.set_difficulty_level(profile.difficulty_level + record.difficulty_adjustment);

        self.update_tags(profile, record);

        profile
            .recent_emotions
            .push_back(dominant_emotion(record.emotional, record.pattern));
        while profile.recent_emotions.len() > self.params.emotion_limit {
            profile.recent_emotions.pop_front();
        }

        profile.recent_sessions.push_back(SessionRecord {
            timestamp: record.timestamp,
            response_time: rt,
            is_correct: record.is_correct,
            strategy: record.strategy.to_string(),
            difficulty_adjustment: record.difficulty_adjustment,
            flow_snapshot: record.flow.snapshot(),
            pattern: Some(record.pattern),
            skill_id: Some(record.skill_id.to_string()),
        });
        while profile.recent_sessions.len() > self.params.session_cap() {
            profile.recent_sessions.pop_front();
        }

        let strategies = trend::distinct_successful_strategies(&profile.recent_sessions) as f64;
        profile.cognitive_flexibility_index = (strategies / self.builder.flexibility_strategy_cap).min(1.0);

        profile.learning_patterns = trend::learning_patterns(&profile.recent_sessions, &self.params);
        profile.performance_trends = trend::performance_trends(&profile.recent_sessions, &self.params);

        profile.interaction_count = profile.interaction_count.saturating_add(1);
        if self.params.style_refresh_interval > 0
            && profile.interaction_count % self.params.style_refresh_interval == 0
        {
            let is_fast = profile.average_response_time < age.response_baseline_ms;
            profile.cognitive_style = derive_cognitive_style(
                &self.builder,
                is_fast,
                profile.correctness_rate,
                profile.persistence_index,
            );
        }

        profile.normalize();
    }

    fn update_tags(&self, profile: &mut StudentProfile, record: &InteractionRecord<'_>) {
        if record.pattern.is_error() {
            profile.common_mistakes.insert(record.pattern.as_str().to_string());
        }
        if matches!(
            record.pattern,
            ResponsePattern::MethodError | ResponsePattern::CompletelyLost
        ) {
            profile.knowledge_gaps.insert(record.skill_id.to_string());
        }
        if let Some(error_type) = record.misconception {
            profile
                .active_misconceptions
                .insert(misconception_tag(record.skill_id, error_type));
        }
        if record.phase_transition == PhaseTransition::Mastered {
            profile.knowledge_gaps.remove(record.skill_id);
            let prefix = format!("{}:", record.skill_id);
            profile
                .active_misconceptions
                .retain(|tag| !tag.starts_with(&prefix));
        }
    }
}

impl Default for ProfileUpdater {
    fn default() -> Self {
        Self::new(
            UpdaterParams::default(),
            AgeProfiles::default(),
            BuilderParams::default(),
        )
    }
}

pub fn misconception_tag(skill_id: &str, error_type: &str) -> String {
    format!("{skill_id}:{error_type}")
}

fn efficacy_observation(pattern: ResponsePattern) -> f64 {
    match pattern {
        ResponsePattern::QuickCorrect => 1.0,
        ResponsePattern::SlowCorrect => 0.8,
        ResponsePattern::HesitantCorrect => 0.6,
        ResponsePattern::ComputationalError | ResponsePattern::MethodError => 0.3,
        ResponsePattern::CompletelyLost | ResponsePattern::PseudoActivity => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutor::modeling::flow::FlowStateCalculator;
    use crate::tutor::types::{Emotion, DIFFICULTY_MAX, DIFFICULTY_MIN};

    fn apply_answer(
        updater: &ProfileUpdater,
        profile: &mut StudentProfile,
        pattern: ResponsePattern,
        rt: f64,
        delta: f64,
    ) {
        let is_correct = pattern.is_correct();
        updater.record_outcome(profile, is_correct, pattern);
        let flow = FlowStateCalculator::default().compute(rt, profile);
        let emotional = EmotionalState::default();
        updater.apply(
            profile,
            &InteractionRecord {
                skill_id: "fractions.add",
                timestamp: profile.interaction_count as i64,
                response_time_ms: rt,
                is_correct,
                pattern,
                strategy: "standard",
                quick_threshold: 2000.0,
                flow: &flow,
                emotional: &emotional,
                difficulty_adjustment: delta,
                phase_transition: PhaseTransition::Stay,
                misconception: None,
            },
        );
    }

    #[test]
    fn test_ema_converges_monotonically() {
        let mut value = 0.0;
        let mut previous_gap = f64::MAX;
        for _ in 0..50 {
            value = ema(value, 1.0, 0.2);
            let gap = (1.0 - value).abs();
            assert!(gap < previous_gap);
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-4);
    }

    #[test]
    fn test_counters_reset_on_opposite_outcome() {
        let updater = ProfileUpdater::default();
        let mut profile = StudentProfile::default();
        updater.record_outcome(&mut profile, false, ResponsePattern::MethodError);
        updater.record_outcome(&mut profile, false, ResponsePattern::MethodError);
        assert_eq!(profile.consecutive_incorrect, 2);
        updater.record_outcome(&mut profile, true, ResponsePattern::SlowCorrect);
        assert_eq!(profile.consecutive_incorrect, 0);
        assert_eq!(profile.consecutive_correct, 1);
    }

    #[test]
    fn test_session_history_evicts_oldest() {
        let updater = ProfileUpdater::default();
        let mut profile = StudentProfile::default();
        for _ in 0..11 {
            apply_answer(&updater, &mut profile, ResponsePattern::SlowCorrect, 7000.0, 0.0);
        }
        assert_eq!(profile.recent_sessions.len(), 10);
        assert_eq!(profile.recent_sessions.front().map(|s| s.timestamp), Some(1));
        assert_eq!(profile.interaction_count, 11);
        assert!(profile.recent_emotions.len() <= 3);
    }

    #[test]
    fn test_oversized_history_limit_still_keeps_ten() {
        let updater = ProfileUpdater::new(
            UpdaterParams {
                history_limit: 50,
                ..Default::default()
            },
            AgeProfiles::default(),
            BuilderParams::default(),
        );
        let mut profile = StudentProfile::default();
        for _ in 0..15 {
            apply_answer(&updater, &mut profile, ResponsePattern::SlowCorrect, 7000.0, 0.0);
        }
        assert_eq!(profile.recent_sessions.len(), 10);
    }

    #[test]
    fn test_difficulty_stays_clamped() {
        let updater = ProfileUpdater::default();
        let mut profile = StudentProfile::default();
        for _ in 0..10 {
            apply_answer(&updater, &mut profile, ResponsePattern::QuickCorrect, 1500.0, 2.0);
        }
        assert_eq!(profile.difficulty_level, DIFFICULTY_MAX);
        for _ in 0..10 {
            apply_answer(&updater, &mut profile, ResponsePattern::CompletelyLost, 9000.0, -2.0);
        }
        assert_eq!(profile.difficulty_level, DIFFICULTY_MIN);
    }

    #[test]
    fn test_correctness_rate_smoothing() {
        let updater = ProfileUpdater::default();
        let mut profile = StudentProfile::default();
        apply_answer(&updater, &mut profile, ResponsePattern::SlowCorrect, 7000.0, 0.0);
        // 0.2 * 1 + 0.8 * 0.5
        assert!((profile.correctness_rate - 0.6).abs() < 1e-9);
        assert!((profile.average_response_time - 6200.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_tags_and_mastery_cleanup() {
        let updater = ProfileUpdater::default();
        let mut profile = StudentProfile::default();
        updater.record_outcome(&mut profile, false, ResponsePattern::MethodError);
        let flow = FlowStateCalculator::default().compute(8000.0, &profile);
        let emotional = EmotionalState {
            frustration: 75.0,
            engagement: 50.0,
            confidence: 30.0,
        };
        let mut record = InteractionRecord {
            skill_id: "fractions.add",
            timestamp: 1,
            response_time_ms: 8000.0,
            is_correct: false,
            pattern: ResponsePattern::MethodError,
            strategy: "standard",
            quick_threshold: 3600.0,
            flow: &flow,
            emotional: &emotional,
            difficulty_adjustment: -1.0,
            phase_transition: PhaseTransition::Stay,
            misconception: Some("common_denominator"),
        };
        updater.apply(&mut profile, &record);
        assert!(profile.common_mistakes.contains("method_error"));
        assert!(profile.knowledge_gaps.contains("fractions.add"));
        assert!(profile
            .active_misconceptions
            .contains("fractions.add:common_denominator"));
        assert_eq!(profile.recent_emotions.back(), Some(&Emotion::Frustrated));

        record.pattern = ResponsePattern::QuickCorrect;
        record.is_correct = true;
        record.misconception = None;
        record.phase_transition = PhaseTransition::Mastered;
        updater.apply(&mut profile, &record);
        assert!(!profile.knowledge_gaps.contains("fractions.add"));
        assert!(profile.active_misconceptions.is_empty());
    }

    #[test]
    fn test_quick_wrong_answers_erode_inhibitory_control() {
        let updater = ProfileUpdater::default();
        let mut profile = StudentProfile::default();
        apply_answer(&updater, &mut profile, ResponsePattern::ComputationalError, 1000.0, 0.0);
        assert!((profile.inhibitory_control_index - 0.4).abs() < 1e-9);
    }
}
