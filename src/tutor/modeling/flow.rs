use crate::tutor::config::AgeProfiles;
use crate::tutor::types::{FlowStateIndicators, StudentProfile};

/// Derives the per-interaction flow and cognitive-load indicators from the
/// current profile. The output is ephemeral and only reaches the profile
/// through the updater's smoothing.
pub struct FlowStateCalculator {
    age: AgeProfiles,
}

impl FlowStateCalculator {
    pub fn new(age: AgeProfiles) -> Self {
        Self { age }
    }

    /// (intrinsic + extraneous) / germane, capped at 2.0.
    pub fn cognitive_load(&self, profile: &StudentProfile) -> f64 {
        let intrinsic = profile.difficulty_level / 10.0;
        let extraneous = profile.knowledge_gaps.len() as f64 / 5.0;
        let germane = (profile.working_memory_capacity / 9.0).max(0.1);
        ((intrinsic + extraneous) / germane).min(2.0)
    }

    pub fn compute(&self, response_time_ms: f64, profile: &StudentProfile) -> FlowStateIndicators {
        let cognitive_load = self.cognitive_load(profile);

        let expected_response_time = (profile.processing_speed * 1000.0).max(1.0);
        let response_time_variance =
            ((response_time_ms - expected_response_time).abs() / expected_response_time).min(1.0);

        let mistakes = profile.common_mistakes.len() as f64;
        let error_stability_index = (1.0 - mistakes / 10.0).clamp(0.0, 1.0);
        let self_correction_frequency = (profile.persistence_index / 5.0).clamp(0.0, 1.0);
        let perceived_challenge = (cognitive_load * profile.difficulty_level).clamp(0.0, 10.0);

        let engagement_level = (0.5 * (profile.self_efficacy + profile.persistence_index / 5.0)
            + 0.2 * (1.0 - response_time_variance)
            + 0.1 * (profile.working_memory_capacity / 9.0))
            .clamp(0.0, 1.0);

        let threshold = self.age.for_group(profile.age_group).load_threshold;
        let frustration_level = (0.5 * (cognitive_load - threshold).max(0.0)
            + 0.3 * (1.0 - profile.self_efficacy)
            + 0.2 * (mistakes / 10.0).min(1.0)
            + 0.2 * (1.0 - profile.inhibitory_control_index))
            .clamp(0.0, 1.0);

        FlowStateIndicators {
            response_time_variance,
            error_stability_index,
            self_correction_frequency,
            perceived_challenge,
            engagement_level,
            frustration_level,
            cognitive_load,
        }
    }
}

impl Default for FlowStateCalculator {
    fn default() -> Self {
        Self::new(AgeProfiles::default())
    }
}
