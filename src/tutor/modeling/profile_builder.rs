use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tutor::config::{AgeParams, AgeProfiles, BuilderParams};
use crate::tutor::types::{
    AgeGroup, CognitiveStyle, ExplanationStyle, StudentProfile, PERSISTENCE_MAX,
    PERSISTENCE_MIN, PROCESSING_SPEED_MAX, PROCESSING_SPEED_MIN, WORKING_MEMORY_MAX,
    WORKING_MEMORY_MIN,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseProfileRecord {
    pub class_level: Option<u8>,
    pub preferred_explanation_style: Option<ExplanationStyle>,
    pub average_response_time: Option<f64>,
    pub difficulty_level: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillProgress {
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub quick_incorrect_attempts: u32,
    pub hints_used: u32,
    pub total_tasks: u32,
    pub effective_strategies: BTreeSet<String>,
}

impl SkillProgress {
    pub fn accuracy(&self) -> Option<f64> {
        if self.total_attempts == 0 {
            return None;
        }
        Some((self.correct_attempts as f64 / self.total_attempts as f64).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticSession {
    pub class_level: Option<u8>,
    pub recent_response_times: Vec<f64>,
    /// Self-reported confidence on a 1-10 scale.
    pub self_reported_confidence: Option<f64>,
}

/// Richer measurements from dedicated assessments; any present field wins over
/// the heuristic fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CognitiveTelemetry {
    pub working_memory_capacity: Option<f64>,
    pub processing_speed: Option<f64>,
    pub attention_regulation_index: Option<f64>,
    pub inhibitory_control_index: Option<f64>,
    pub cognitive_flexibility_index: Option<f64>,
    pub persistence_index: Option<f64>,
    pub self_efficacy: Option<f64>,
    pub cognitive_style: Option<CognitiveStyle>,
}

pub struct CognitiveProfileBuilder {
    age: AgeProfiles,
    params: BuilderParams,
}

impl CognitiveProfileBuilder {
    pub fn new(age: AgeProfiles, params: BuilderParams) -> Self {
        Self { age, params }
    }

    pub fn build(
        &self,
        base: &BaseProfileRecord,
        progress: &SkillProgress,
        diagnostic: Option<&DiagnosticSession>,
        telemetry: Option<&CognitiveTelemetry>,
    ) -> StudentProfile {
        let empty_telemetry = CognitiveTelemetry::default();
        let telemetry = telemetry.unwrap_or(&empty_telemetry);

        let class_level = base
            .class_level
            .or_else(|| diagnostic.and_then(|d| d.class_level))
            .unwrap_or(7);
        let age_group = AgeGroup::from_class_level(class_level);
        let age = self.age.for_group(age_group);

        let accuracy = progress.accuracy();
        let correctness_rate = accuracy.unwrap_or(0.5);

        let recent_times: &[f64] = diagnostic
            .map(|d| d.recent_response_times.as_slice())
            .unwrap_or(&[]);
        let average_response_time = base
            .average_response_time
            .filter(|v| v.is_finite() && *v > 0.0)
            .or_else(|| mean(recent_times))
            .unwrap_or(age.response_baseline_ms);

        let working_memory_capacity = telemetry
            .working_memory_capacity
            .unwrap_or_else(|| working_memory_fallback(age, correctness_rate))
            .clamp(WORKING_MEMORY_MIN, WORKING_MEMORY_MAX);

        let processing_speed = telemetry
            .processing_speed
            .unwrap_or_else(|| processing_speed_from_response(age, average_response_time))
            .clamp(PROCESSING_SPEED_MIN, PROCESSING_SPEED_MAX);

        let attention_regulation_index = telemetry
            .attention_regulation_index
            .unwrap_or_else(|| {
                if recent_times.len() < self.params.min_attention_samples {
                    0.5
                } else {
                    (1.0 - coefficient_of_variation(recent_times)).max(0.0)
                }
            })
            .clamp(0.0, 1.0);

        let inhibitory_control_index = telemetry
            .inhibitory_control_index
            .unwrap_or_else(|| {
                if progress.total_attempts == 0 {
                    0.5
                } else {
                    1.0 - 2.0
                        * (progress.quick_incorrect_attempts as f64
                            / progress.total_attempts as f64)
                }
            })
            .clamp(0.0, 1.0);

        let cognitive_flexibility_index = telemetry
            .cognitive_flexibility_index
            .unwrap_or_else(|| {
                (progress.effective_strategies.len() as f64
                    / self.params.flexibility_strategy_cap)
                    .min(1.0)
            })
            .clamp(0.0, 1.0);

        let persistence_index = telemetry
            .persistence_index
            .unwrap_or_else(|| {
                if progress.total_tasks == 0 {
                    3.0
                } else {
                    5.0 - progress.hints_used as f64 / progress.total_tasks as f64
                }
            })
            .clamp(PERSISTENCE_MIN, PERSISTENCE_MAX);

        let self_efficacy = telemetry
            .self_efficacy
            .or_else(|| {
                diagnostic
                    .and_then(|d| d.self_reported_confidence)
                    .map(|c| c / 10.0)
            })
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);

        let cognitive_style = telemetry.cognitive_style.unwrap_or_else(|| {
            derive_cognitive_style(
                &self.params,
                average_response_time < age.response_baseline_ms,
                correctness_rate,
                persistence_index,
            )
        });

        let difficulty_level = base
            .difficulty_level
            .unwrap_or(1.0 + 6.0 * correctness_rate * 0.5);

        let mut profile = StudentProfile {
            average_response_time,
            correctness_rate,
            preferred_explanation_style: base.preferred_explanation_style.unwrap_or_default(),
            difficulty_level,
            working_memory_capacity,
            processing_speed,
            attention_regulation_index,
            inhibitory_control_index,
            cognitive_flexibility_index,
            self_efficacy,
            persistence_index,
            age_group,
            class_level,
            attention_span_minutes: age.attention_span_minutes,
            cognitive_style,
            ..Default::default()
        };
        profile.normalize();

        tracing::debug!(
            age_group = age_group.as_str(),
            cognitive_style = cognitive_style.as_str(),
            working_memory = working_memory_capacity,
            processing_speed,
            "cognitive profile built from aggregates"
        );

        profile
    }
}

impl Default for CognitiveProfileBuilder {
    fn default() -> Self {
        Self::new(AgeProfiles::default(), BuilderParams::default())
    }
}

pub fn working_memory_fallback(age: &AgeParams, accuracy: f64) -> f64 {
    let performance_modifier = 0.8 + 0.4 * accuracy.clamp(0.0, 1.0);
    (age.working_memory_baseline * performance_modifier).clamp(WORKING_MEMORY_MIN, WORKING_MEMORY_MAX)
}

pub fn processing_speed_from_response(age: &AgeParams, response_time_ms: f64) -> f64 {
    (age.response_baseline_ms / response_time_ms.max(1000.0) * 50.0)
        .clamp(PROCESSING_SPEED_MIN, PROCESSING_SPEED_MAX)
}

pub fn derive_cognitive_style(
    params: &BuilderParams,
    is_fast: bool,
    accuracy: f64,
    persistence: f64,
) -> CognitiveStyle {
    if is_fast && accuracy < params.fast_accuracy_ceiling {
        CognitiveStyle::Impulsive
    } else if !is_fast && accuracy >= params.reflective_accuracy_floor {
        CognitiveStyle::Reflective
    } else if persistence >= params.persistent_index_floor
        && accuracy > params.persistent_accuracy_floor
    {
        CognitiveStyle::Persistent
    } else if persistence < params.minimalist_persistence_ceiling {
        CognitiveStyle::Minimalist
    } else {
        CognitiveStyle::Optimistic
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let Some(mean) = mean(values) else {
        return 0.0;
    };
    if mean.abs() < 1e-9 {
        return 0.0;
    }
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(total: u32, correct: u32) -> SkillProgress {
        SkillProgress {
            total_attempts: total,
            correct_attempts: correct,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_without_any_data() {
        let builder = CognitiveProfileBuilder::default();
        let profile = builder.build(
            &BaseProfileRecord::default(),
            &SkillProgress::default(),
            None,
            None,
        );
        assert_eq!(profile.age_group, AgeGroup::Middle);
        assert_eq!(profile.attention_span_minutes, 15);
        assert_eq!(profile.attention_regulation_index, 0.5);
        assert_eq!(profile.inhibitory_control_index, 0.5);
        assert_eq!(profile.persistence_index, 3.0);
        assert!((profile.working_memory_capacity - 5.5).abs() < 1e-9);
        assert!((profile.processing_speed - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_age_group_from_class_level_drives_baselines() {
        let builder = CognitiveProfileBuilder::default();
        let base = BaseProfileRecord {
            class_level: Some(3),
            ..Default::default()
        };
        let profile = builder.build(&base, &progress(10, 10), None, None);
        assert_eq!(profile.age_group, AgeGroup::Elementary);
        assert_eq!(profile.attention_span_minutes, 8);
        // 4.0 * (0.8 + 0.4)
        assert!((profile.working_memory_capacity - 4.8).abs() < 1e-9);

        let high = BaseProfileRecord {
            class_level: Some(11),
            ..Default::default()
        };
        let profile = builder.build(&high, &progress(10, 10), None, None);
        assert_eq!(profile.age_group, AgeGroup::HighSchool);
        assert_eq!(profile.attention_span_minutes, 25);
        assert!((profile.working_memory_capacity - 8.4).abs() < 1e-9);
    }

    #[test]
    fn test_processing_speed_bounds() {
        let age = AgeProfiles::default();
        let middle = age.for_group(AgeGroup::Middle);
        assert_eq!(processing_speed_from_response(middle, 100.0), 100.0);
        assert!((processing_speed_from_response(middle, 6000.0) - 50.0).abs() < 1e-9);
        assert_eq!(processing_speed_from_response(middle, 1_000_000.0), 1.0);
    }

    #[test]
    fn test_attention_from_response_time_variation() {
        let builder = CognitiveProfileBuilder::default();
        let steady = DiagnosticSession {
            recent_response_times: vec![5000.0, 5000.0, 5000.0, 5000.0],
            ..Default::default()
        };
        let profile = builder.build(&BaseProfileRecord::default(), &SkillProgress::default(), Some(&steady), None);
        assert!((profile.attention_regulation_index - 1.0).abs() < 1e-9);

        let erratic = DiagnosticSession {
            recent_response_times: vec![500.0, 20_000.0, 1000.0, 30_000.0],
            ..Default::default()
        };
        let profile = builder.build(&BaseProfileRecord::default(), &SkillProgress::default(), Some(&erratic), None);
        assert!(profile.attention_regulation_index < 0.3);
    }

    #[test]
    fn test_inhibitory_and_persistence_fallbacks() {
        let builder = CognitiveProfileBuilder::default();
        let progress = SkillProgress {
            total_attempts: 10,
            correct_attempts: 5,
            quick_incorrect_attempts: 2,
            hints_used: 12,
            total_tasks: 4,
            effective_strategies: ["drawing", "estimation"].iter().map(|s| s.to_string()).collect(),
        };
        let profile = builder.build(&BaseProfileRecord::default(), &progress, None, None);
        assert!((profile.inhibitory_control_index - 0.6).abs() < 1e-9);
        assert!((profile.persistence_index - 2.0).abs() < 1e-9);
        assert!((profile.cognitive_flexibility_index - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_telemetry_wins_over_fallback() {
        let builder = CognitiveProfileBuilder::default();
        let telemetry = CognitiveTelemetry {
            working_memory_capacity: Some(8.0),
            processing_speed: Some(400.0),
            cognitive_style: Some(CognitiveStyle::Reflective),
            ..Default::default()
        };
        let profile = builder.build(&BaseProfileRecord::default(), &progress(4, 1), None, Some(&telemetry));
        assert_eq!(profile.working_memory_capacity, 8.0);
        assert_eq!(profile.processing_speed, PROCESSING_SPEED_MAX);
        assert_eq!(profile.cognitive_style, CognitiveStyle::Reflective);
    }

    #[test]
    fn test_cognitive_style_tree() {
        let params = BuilderParams::default();
        assert_eq!(derive_cognitive_style(&params, true, 0.4, 3.0), CognitiveStyle::Impulsive);
        assert_eq!(derive_cognitive_style(&params, false, 0.9, 3.0), CognitiveStyle::Reflective);
        assert_eq!(derive_cognitive_style(&params, true, 0.75, 4.0), CognitiveStyle::Persistent);
        assert_eq!(derive_cognitive_style(&params, false, 0.5, 2.0), CognitiveStyle::Minimalist);
        assert_eq!(derive_cognitive_style(&params, false, 0.5, 3.0), CognitiveStyle::Optimistic);
    }
}
