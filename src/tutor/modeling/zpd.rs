use crate::tutor::config::ZpdParams;
use crate::tutor::types::{ResponsePattern, ZpdZone};

/// Target band of task difficulty relative to current mastery.
pub fn optimal_band(correctness_rate: f64, params: &ZpdParams) -> (f64, f64) {
    (
        correctness_rate + params.lower_offset,
        correctness_rate + params.upper_offset,
    )
}

/// Task difficulty implied by how the learner handled it.
pub fn estimated_task_difficulty(pattern: ResponsePattern, correctness_rate: f64) -> f64 {
    let offset = match pattern {
        ResponsePattern::QuickCorrect => -0.2,
        ResponsePattern::SlowCorrect => 0.15,
        ResponsePattern::HesitantCorrect => 0.1,
        ResponsePattern::ComputationalError => 0.25,
        ResponsePattern::MethodError => 0.4,
        ResponsePattern::CompletelyLost => 0.6,
        ResponsePattern::PseudoActivity => 0.0,
    };
    correctness_rate + offset
}

pub fn classify_zone(pattern: ResponsePattern, correctness_rate: f64, params: &ZpdParams) -> ZpdZone {
    let (low, high) = optimal_band(correctness_rate, params);
    let task = estimated_task_difficulty(pattern, correctness_rate);
    if task < low {
        ZpdZone::TooEasy
    } else if task > high {
        ZpdZone::TooHard
    } else {
        ZpdZone::Within
    }
}

/// 1.0 inside the band, linear falloff outside, floored at 0.
pub fn zpd_alignment(pattern: ResponsePattern, correctness_rate: f64, params: &ZpdParams) -> f64 {
    let (low, high) = optimal_band(correctness_rate, params);
    let task = estimated_task_difficulty(pattern, correctness_rate);
    let distance = if task < low {
        low - task
    } else if task > high {
        task - high
    } else {
        0.0
    };
    (1.0 - distance * params.falloff).max(0.0)
}
