use serde::{Deserialize, Serialize};

use crate::tutor::types::AgeGroup;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierParams {
    pub min_quick_threshold_ms: f64,
    pub quick_ratio: f64,
    pub slow_ratio: f64,
    pub short_answer_len: usize,
    pub short_answer_fraction: f64,
    pub single_digit_ms: f64,
    pub give_up_fraction: f64,
    pub computational_error_pct: f64,
    pub give_up_tokens: Vec<String>,
    pub hesitation_markers: Vec<String>,
    pub lost_markers: Vec<String>,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            min_quick_threshold_ms: 2000.0,
            quick_ratio: 0.6,
            slow_ratio: 1.8,
            short_answer_len: 3,
            short_answer_fraction: 0.5,
            single_digit_ms: 2000.0,
            give_up_fraction: 0.7,
            computational_error_pct: 15.0,
            give_up_tokens: to_strings(&["nie wiem", "tak", "nie", "0", "?", "idk", "x", "-"]),
            hesitation_markers: to_strings(&[
                "chyba",
                "może",
                "?",
                "nie jestem pewien",
                "nie jestem pewna",
                "wydaje mi się",
                "hmm",
                "maybe",
                "i think",
            ]),
            lost_markers: to_strings(&[
                "nie wiem",
                "nie rozumiem",
                "nie mam pojęcia",
                "pomocy",
                "no idea",
                "don't know",
                "i don't understand",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeParams {
    pub working_memory_baseline: f64,
    pub response_baseline_ms: f64,
    pub attention_span_minutes: u32,
    pub load_threshold: f64,
    pub difficulty_damping: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeProfiles {
    pub elementary: AgeParams,
    pub middle: AgeParams,
    pub high_school: AgeParams,
}

impl Default for AgeProfiles {
    fn default() -> Self {
        Self {
            elementary: AgeParams {
                working_memory_baseline: 4.0,
                response_baseline_ms: 8000.0,
                attention_span_minutes: 8,
                load_threshold: 0.8,
                difficulty_damping: 0.7,
            },
            middle: AgeParams {
                working_memory_baseline: 5.5,
                response_baseline_ms: 6000.0,
                attention_span_minutes: 15,
                load_threshold: 1.0,
                difficulty_damping: 1.0,
            },
            high_school: AgeParams {
                working_memory_baseline: 7.0,
                response_baseline_ms: 4500.0,
                attention_span_minutes: 25,
                load_threshold: 1.2,
                difficulty_damping: 1.0,
            },
        }
    }
}

impl AgeProfiles {
    pub fn for_group(&self, group: AgeGroup) -> &AgeParams {
        match group {
            AgeGroup::Elementary => &self.elementary,
            AgeGroup::Middle => &self.middle,
            AgeGroup::HighSchool => &self.high_school,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderParams {
    pub min_attention_samples: usize,
    pub flexibility_strategy_cap: f64,
    pub fast_accuracy_ceiling: f64,
    pub reflective_accuracy_floor: f64,
    pub persistent_index_floor: f64,
    pub persistent_accuracy_floor: f64,
    pub minimalist_persistence_ceiling: f64,
}

impl Default for BuilderParams {
    fn default() -> Self {
        Self {
            min_attention_samples: 3,
            flexibility_strategy_cap: 5.0,
            fast_accuracy_ceiling: 0.6,
            reflective_accuracy_floor: 0.8,
            persistent_index_floor: 3.5,
            persistent_accuracy_floor: 0.7,
            minimalist_persistence_ceiling: 2.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZpdParams {
    pub lower_offset: f64,
    pub upper_offset: f64,
    pub falloff: f64,
}

impl Default for ZpdParams {
    fn default() -> Self {
        Self {
            lower_offset: 0.10,
            upper_offset: 0.30,
            falloff: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionParams {
    pub incorrect_step: f64,
    pub incorrect_cap: f64,
    pub time_pressure_penalty: f64,
    pub low_correctness_threshold: f64,
    pub low_correctness_penalty: f64,
    pub pseudo_engagement_penalty: f64,
    pub confidence_base: f64,
    pub confidence_step: f64,
    pub hesitation_penalty: f64,
}

impl Default for EmotionParams {
    fn default() -> Self {
        Self {
            incorrect_step: 20.0,
            incorrect_cap: 60.0,
            time_pressure_penalty: 20.0,
            low_correctness_threshold: 0.3,
            low_correctness_penalty: 20.0,
            pseudo_engagement_penalty: 15.0,
            confidence_base: 50.0,
            confidence_step: 10.0,
            hesitation_penalty: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseParams {
    pub window: usize,
    pub worked_example_confidence: f64,
    pub guided_accuracy: f64,
    pub guided_streak: u32,
    pub independent_accuracy: f64,
    pub independent_streak: u32,
    pub mastery_accuracy: f64,
    pub mastery_streak: u32,
}

impl Default for PhaseParams {
    fn default() -> Self {
        Self {
            window: 10,
            worked_example_confidence: 60.0,
            guided_accuracy: 0.70,
            guided_streak: 2,
            independent_accuracy: 0.80,
            independent_streak: 3,
            mastery_accuracy: 0.90,
            mastery_streak: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionParams {
    pub break_frustration: f64,
    pub context_change_engagement: f64,
    pub prerequisite_incorrect_streak: u32,
    pub max_step: f64,
    pub practice_more_problems: u32,
    pub review_problems: u32,
}

impl Default for DecisionParams {
    fn default() -> Self {
        Self {
            break_frustration: 80.0,
            context_change_engagement: 30.0,
            prerequisite_incorrect_streak: 3,
            max_step: 2.0,
            practice_more_problems: 3,
            review_problems: 2,
        }
    }
}

/// Upper bound on the session ring buffer, whatever the configuration says.
pub const MAX_SESSION_HISTORY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterParams {
    pub ema_alpha: f64,
    pub history_limit: usize,
    pub consistency_window: usize,
    pub improvement_recent: usize,
    pub weekly_window: usize,
    pub optimal_engagement: f64,
    pub peak_engagement: f64,
    pub peak_frustration: f64,
    pub peak_rt_margin: f64,
    pub preferred_strategy_count: usize,
    pub emotion_limit: usize,
    pub style_refresh_interval: u64,
    pub trend_threshold: f64,
}

impl UpdaterParams {
    pub fn session_cap(&self) -> usize {
        self.history_limit.clamp(1, MAX_SESSION_HISTORY)
    }
}

impl Default for UpdaterParams {
    fn default() -> Self {
        Self {
            ema_alpha: 0.2,
            history_limit: 10,
            consistency_window: 5,
            improvement_recent: 3,
            weekly_window: 7,
            optimal_engagement: 0.6,
            peak_engagement: 0.8,
            peak_frustration: 0.3,
            peak_rt_margin: 0.2,
            preferred_strategy_count: 3,
            emotion_limit: 3,
            style_refresh_interval: 10,
            trend_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceParams {
    pub timeout_ms: u64,
    pub max_retries: usize,
    pub base_backoff_ms: u64,
    pub max_conflict_retries: usize,
}

impl Default for PersistenceParams {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_retries: 3,
            base_backoff_ms: 50,
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TutorConfig {
    pub classifier: ClassifierParams,
    pub age: AgeProfiles,
    pub builder: BuilderParams,
    pub zpd: ZpdParams,
    pub emotion: EmotionParams,
    pub phase: PhaseParams,
    pub decision: DecisionParams,
    pub updater: UpdaterParams,
    pub persistence: PersistenceParams,
}

impl TutorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let mut config = Self::default();

        if let Some(val) = parse_as::<f64>(parse("TUTOR_EMA_ALPHA")) {
            if val > 0.0 && val <= 1.0 {
                config.updater.ema_alpha = val;
            }
        }
        if let Some(val) = parse_as::<usize>(parse("TUTOR_HISTORY_LIMIT")) {
            config.updater.history_limit = val.clamp(1, MAX_SESSION_HISTORY);
        }
        if let Some(val) = parse_as::<f64>(parse("TUTOR_ELEMENTARY_DAMPING")) {
            config.age.elementary.difficulty_damping = val.clamp(0.0, 1.0);
        }
        if let Some(val) = parse_as::<u64>(parse("TUTOR_STORE_TIMEOUT_MS")) {
            config.persistence.timeout_ms = val.max(1);
        }
        if let Some(val) = parse_as::<usize>(parse("TUTOR_STORE_MAX_RETRIES")) {
            config.persistence.max_retries = val;
        }

        config
    }
}

fn parse_as<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
    raw?.parse().ok()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_profiles_lookup() {
        let profiles = AgeProfiles::default();
        assert_eq!(profiles.for_group(AgeGroup::Elementary).working_memory_baseline, 4.0);
        assert_eq!(profiles.for_group(AgeGroup::Middle).working_memory_baseline, 5.5);
        assert_eq!(profiles.for_group(AgeGroup::HighSchool).working_memory_baseline, 7.0);
        assert_eq!(profiles.for_group(AgeGroup::Elementary).difficulty_damping, 0.7);
    }

    #[test]
    fn test_config_roundtrip_serialization() {
        let config = TutorConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        let restored: TutorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(restored.updater.ema_alpha, 0.2);
        assert_eq!(restored.updater.history_limit, 10);
        assert_eq!(restored.phase.mastery_streak, 4);
    }

    fn config_from(pairs: &[(&str, &str)]) -> TutorConfig {
        let vars: std::collections::HashMap<&str, &str> = pairs.iter().copied().collect();
        TutorConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_history_limit_override_is_capped() {
        let config = config_from(&[("TUTOR_HISTORY_LIMIT", "50")]);
        assert_eq!(config.updater.history_limit, MAX_SESSION_HISTORY);

        let config = config_from(&[("TUTOR_HISTORY_LIMIT", "0")]);
        assert_eq!(config.updater.history_limit, 1);

        let config = config_from(&[("TUTOR_HISTORY_LIMIT", " 5 ")]);
        assert_eq!(config.updater.history_limit, 5);
    }

    #[test]
    fn test_env_overrides_and_rejections() {
        let config = config_from(&[
            ("TUTOR_EMA_ALPHA", "1.5"),
            ("TUTOR_ELEMENTARY_DAMPING", "0.5"),
            ("TUTOR_STORE_TIMEOUT_MS", "0"),
            ("TUTOR_STORE_MAX_RETRIES", "nope"),
        ]);
        assert_eq!(config.updater.ema_alpha, 0.2);
        assert_eq!(config.age.elementary.difficulty_damping, 0.5);
        assert_eq!(config.persistence.timeout_ms, 1);
        assert_eq!(config.persistence.max_retries, 3);
    }

    #[test]
    fn test_session_cap_ignores_oversized_limit() {
        let params = UpdaterParams {
            history_limit: 50,
            ..Default::default()
        };
        assert_eq!(params.session_cap(), MAX_SESSION_HISTORY);
    }
}
