//! Emotion estimate feeding the teaching-moment policy.

use tutor_engine::tutor::config::TutorConfig;
use tutor_engine::tutor::decision::{DecisionContext, PhaseMachine, TeachingPolicy};
use tutor_engine::tutor::modeling::{EmotionEstimator, EmotionInput, FlowStateCalculator};
use tutor_engine::tutor::{
    AgeGroup, MomentType, NextAction, PhaseState, PhaseTransition, ResponsePattern,
    ScaffoldingPhase, StudentProfile,
};

fn policy() -> TeachingPolicy {
    let config = TutorConfig::default();
    TeachingPolicy::new(config.decision, config.age)
}

#[test]
fn test_frustration_of_eighty_suggests_break() {
    let profile = StudentProfile {
        consecutive_incorrect: 3,
        correctness_rate: 0.25,
        ..Default::default()
    };
    let flow = FlowStateCalculator::default().compute(6000.0, &profile);
    let emotional = EmotionEstimator::default().estimate(&EmotionInput {
        profile: &profile,
        flow: &flow,
        pattern: ResponsePattern::MethodError,
        time_pressure: false,
        self_reported_confidence: None,
    });
    assert!((emotional.frustration - 80.0).abs() < 1e-9);

    let moment = policy().decide(
        ResponsePattern::MethodError,
        &profile,
        &flow,
        ScaffoldingPhase::GuidedPractice,
        &DecisionContext {
            skill_id: "fractions.add",
            emotional: &emotional,
            phase_transition: PhaseTransition::Stay,
            math_error: None,
        },
    );
    assert_eq!(moment.next_action, NextAction::BreakSuggestion);
    assert_eq!(moment.kind, MomentType::Intervention);
    assert_eq!(moment.message, "hint.method_review");
    assert!(moment.difficulty_adjustment <= 0.0);
}

#[test]
fn test_difficulty_step_is_bounded_for_every_pattern_and_age() {
    let patterns = [
        ResponsePattern::QuickCorrect,
        ResponsePattern::SlowCorrect,
        ResponsePattern::HesitantCorrect,
        ResponsePattern::ComputationalError,
        ResponsePattern::MethodError,
        ResponsePattern::CompletelyLost,
        ResponsePattern::PseudoActivity,
    ];
    let policy = policy();
    for age_group in [AgeGroup::Elementary, AgeGroup::Middle, AgeGroup::HighSchool] {
        for pattern in patterns {
            let profile = StudentProfile {
                age_group,
                ..Default::default()
            };
            let flow = FlowStateCalculator::default().compute(5000.0, &profile);
            let emotional = EmotionEstimator::default().estimate(&EmotionInput {
                profile: &profile,
                flow: &flow,
                pattern,
                time_pressure: false,
                self_reported_confidence: None,
            });
            let moment = policy.decide(
                pattern,
                &profile,
                &flow,
                ScaffoldingPhase::GuidedPractice,
                &DecisionContext {
                    skill_id: "s",
                    emotional: &emotional,
                    phase_transition: PhaseTransition::Stay,
                    math_error: None,
                },
            );
            assert!(moment.difficulty_adjustment.abs() <= 2.0);
            if age_group == AgeGroup::Elementary {
                assert!(moment.difficulty_adjustment.abs() <= 1.4 + 1e-9);
            }
        }
    }
}

#[test]
fn test_mastery_checkpoint_after_full_progression() {
    let machine = PhaseMachine::default();
    let mut state = PhaseState::default();
    let mut transitions = Vec::new();
    for step in 0..12 {
        machine.record_outcome(&mut state, true);
        transitions.push(machine.evaluate(&mut state, 80.0, step));
    }
    assert!(state.mastered);
    assert!(transitions.contains(&PhaseTransition::Mastered));

    let profile = StudentProfile::default();
    let flow = FlowStateCalculator::default().compute(5000.0, &profile);
    let emotional = tutor_engine::tutor::EmotionalState::default();
    let moment = policy().decide(
        ResponsePattern::QuickCorrect,
        &profile,
        &flow,
        state.phase,
        &DecisionContext {
            skill_id: "s",
            emotional: &emotional,
            phase_transition: PhaseTransition::Mastered,
            math_error: None,
        },
    );
    assert_eq!(moment.kind, MomentType::Checkpoint);
}
