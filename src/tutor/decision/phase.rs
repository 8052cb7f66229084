use crate::tutor::config::PhaseParams;
use crate::tutor::types::{PhaseState, PhaseTransition, ScaffoldingPhase};

/// Per-skill scaffolding progression. Phases only move forward, except for the
/// explicit review regression triggered by the decision policy.
pub struct PhaseMachine {
    params: PhaseParams,
}

impl PhaseMachine {
    pub fn new(params: PhaseParams) -> Self {
        Self { params }
    }

    pub fn record_outcome(&self, state: &mut PhaseState, is_correct: bool) {
        state.recent_outcomes.push_back(is_correct);
        while state.recent_outcomes.len() > self.params.window {
            state.recent_outcomes.pop_front();
        }
        if is_correct {
            state.consecutive_correct = state.consecutive_correct.saturating_add(1);
        } else {
            state.consecutive_correct = 0;
        }
    }

    pub fn can_advance(&self, state: &PhaseState, confidence: f64) -> bool {
        let p = &self.params;
        let accuracy = state.accuracy();
        let streak = state.consecutive_correct;
        match state.phase {
            ScaffoldingPhase::TheoryIntroduction => true,
            ScaffoldingPhase::WorkedExample => confidence > p.worked_example_confidence,
            ScaffoldingPhase::GuidedPractice => {
                accuracy >= p.guided_accuracy && streak >= p.guided_streak
            }
            ScaffoldingPhase::IndependentPractice => {
                accuracy >= p.independent_accuracy && streak >= p.independent_streak
            }
            ScaffoldingPhase::MasteryCheck => {
                accuracy >= p.mastery_accuracy && streak >= p.mastery_streak
            }
        }
    }

    pub fn evaluate(&self, state: &mut PhaseState, confidence: f64, now_ms: i64) -> PhaseTransition {
        if state.mastered || !self.can_advance(state, confidence) {
            return PhaseTransition::Stay;
        }

        match state.phase.next() {
            Some(next) => {
                let from = state.phase;
                self.enter(state, next, now_ms);
                tracing::debug!(from = from.as_str(), to = next.as_str(), "scaffolding phase advanced");
                PhaseTransition::Advanced { from, to: next }
            }
            None => {
                state.mastered = true;
                PhaseTransition::Mastered
            }
        }
    }

    /// Review drops the learner back to guided practice; re-entry then follows
    /// the regular guided-practice advance condition.
    pub fn review(&self, state: &mut PhaseState, now_ms: i64) -> PhaseTransition {
        let from = state.phase;
        if from <= ScaffoldingPhase::GuidedPractice {
            return PhaseTransition::Stay;
        }
        state.mastered = false;
        self.enter(state, ScaffoldingPhase::GuidedPractice, now_ms);
        PhaseTransition::Regressed {
            from,
            to: ScaffoldingPhase::GuidedPractice,
        }
    }

    fn enter(&self, state: &mut PhaseState, phase: ScaffoldingPhase, now_ms: i64) {
        state.phase = phase;
        state.recent_outcomes.clear();
        state.consecutive_correct = 0;
        state.entered_at = now_ms;
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new(PhaseParams::default())
    }
}
