use std::collections::{BTreeMap, VecDeque};

use crate::tutor::config::UpdaterParams;
use crate::tutor::types::{
    LearningPatterns, PeakConditions, PerformanceTrends, SessionRecord, TrendState, ValueRange,
};

/// Recomputes derived learning patterns from the bounded session history.
pub fn learning_patterns(sessions: &VecDeque<SessionRecord>, params: &UpdaterParams) -> LearningPatterns {
    let outcomes = binary_outcomes(sessions);

    LearningPatterns {
        consistency: consistency(&outcomes, params.consistency_window),
        improvement_trend: improvement_trend(&outcomes, params.improvement_recent),
        optimal_difficulty_range: optimal_difficulty_range(sessions, params.optimal_engagement),
        preferred_strategies: preferred_strategies(sessions, params.preferred_strategy_count),
        peak_performance_conditions: peak_performance_conditions(sessions, params),
    }
}

pub fn performance_trends(sessions: &VecDeque<SessionRecord>, params: &UpdaterParams) -> PerformanceTrends {
    let outcomes = binary_outcomes(sessions);
    let weekly_start = outcomes.len().saturating_sub(params.weekly_window);
    let weekly_trend = ols_slope(&outcomes[weekly_start..]);
    let monthly_trend = ols_slope(&outcomes);

    let trend = if weekly_trend > params.trend_threshold {
        TrendState::Up
    } else if weekly_trend < -params.trend_threshold {
        TrendState::Down
    } else {
        TrendState::Flat
    };

    PerformanceTrends {
        weekly_trend,
        monthly_trend,
        trend,
        current_streak: current_streak(&outcomes),
        best_streak: best_streak(&outcomes),
    }
}

fn binary_outcomes(sessions: &VecDeque<SessionRecord>) -> Vec<f64> {
    sessions
        .iter()
        .map(|s| if s.is_correct { 1.0 } else { 0.0 })
        .collect()
}

/// `max(0, 1 - stddev)` of the last `window` outcomes.
pub fn consistency(outcomes: &[f64], window: usize) -> f64 {
    let start = outcomes.len().saturating_sub(window);
    let recent = &outcomes[start..];
    if recent.is_empty() {
        return 0.5;
    }
    (1.0 - variance(recent).sqrt()).max(0.0)
}

/// Accuracy of the last `recent` outcomes minus accuracy of everything before.
pub fn improvement_trend(outcomes: &[f64], recent: usize) -> f64 {
    if outcomes.len() <= recent {
        return 0.0;
    }
    let split = outcomes.len() - recent;
    mean(&outcomes[split..]) - mean(&outcomes[..split])
}

fn optimal_difficulty_range(sessions: &VecDeque<SessionRecord>, min_engagement: f64) -> Option<ValueRange> {
    let challenges: Vec<f64> = sessions
        .iter()
        .filter(|s| s.is_correct && s.flow_snapshot.engagement > min_engagement)
        .map(|s| s.flow_snapshot.perceived_challenge)
        .collect();
    range_of(&challenges)
}

fn preferred_strategies(sessions: &VecDeque<SessionRecord>, count: usize) -> Vec<String> {
    let successes = success_counts(sessions.iter().filter(|s| s.is_correct));
    top_by_count(successes, count)
}

fn peak_performance_conditions(
    sessions: &VecDeque<SessionRecord>,
    params: &UpdaterParams,
) -> Option<PeakConditions> {
    let peak: Vec<&SessionRecord> = sessions
        .iter()
        .filter(|s| {
            s.is_correct
                && s.flow_snapshot.engagement > params.peak_engagement
                && s.flow_snapshot.frustration < params.peak_frustration
        })
        .collect();
    if peak.is_empty() {
        return None;
    }

    let times: Vec<f64> = peak.iter().map(|s| s.response_time).collect();
    let avg = mean(&times);
    let strategies = top_by_count(success_counts(peak.iter().copied()), params.preferred_strategy_count);

    Some(PeakConditions {
        response_time: ValueRange {
            min: avg * (1.0 - params.peak_rt_margin),
            max: avg * (1.0 + params.peak_rt_margin),
        },
        strategies,
    })
}

fn success_counts<'a>(sessions: impl Iterator<Item = &'a SessionRecord>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for session in sessions {
        *counts.entry(session.strategy.clone()).or_insert(0) += 1;
    }
    counts
}

fn top_by_count(counts: BTreeMap<String, usize>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    // stable sort keeps alphabetical order for ties
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(limit).map(|(s, _)| s).collect()
}

/// Least-squares slope of `values` against their index.
pub fn ols_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_xx: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();

    let denominator = n * sum_xx - sum_x.powi(2);
    if denominator.abs() < 1e-10 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

/// Correct answers counted backward from the newest outcome.
pub fn current_streak(outcomes: &[f64]) -> u32 {
    outcomes.iter().rev().take_while(|o| **o > 0.5).count() as u32
}

pub fn best_streak(outcomes: &[f64]) -> u32 {
    let mut best = 0;
    let mut run = 0;
    for o in outcomes {
        if *o > 0.5 {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

pub fn distinct_successful_strategies(sessions: &VecDeque<SessionRecord>) -> usize {
    success_counts(sessions.iter().filter(|s| s.is_correct)).len()
}

fn range_of(values: &[f64]) -> Option<ValueRange> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(ValueRange { min, max })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}
