use std::collections::BTreeSet;

use crate::tutor::collaborators::MathErrorAnalysis;
use crate::tutor::config::{AgeProfiles, DecisionParams};
use crate::tutor::types::{
    EmotionalState, FlowStateIndicators, MomentType, NextAction, PhaseTransition,
    ResponsePattern, ScaffoldingPhase, StudentProfile, TeachingMoment,
};

pub struct DecisionContext<'a> {
    pub skill_id: &'a str,
    pub emotional: &'a EmotionalState,
    pub phase_transition: PhaseTransition,
    pub math_error: Option<&'a MathErrorAnalysis>,
}

struct BaseRule {
    kind: MomentType,
    message: &'static str,
    action: NextAction,
    delta: f64,
    ask_confidence: bool,
}

fn base_rule(pattern: ResponsePattern) -> BaseRule {
    match pattern {
        ResponsePattern::QuickCorrect => BaseRule {
            kind: MomentType::Praise,
            message: "praise.quick_correct",
            action: NextAction::IncreaseDifficulty,
            delta: 2.0,
            ask_confidence: false,
        },
        ResponsePattern::SlowCorrect => BaseRule {
            kind: MomentType::Praise,
            message: "praise.effort",
            action: NextAction::Continue,
            delta: 0.0,
            ask_confidence: false,
        },
        ResponsePattern::HesitantCorrect => BaseRule {
            kind: MomentType::Encouragement,
            message: "encouragement.confidence_check",
            action: NextAction::Continue,
            delta: 0.0,
            ask_confidence: true,
        },
        ResponsePattern::ComputationalError => BaseRule {
            kind: MomentType::Correction,
            message: "correction.arithmetic_slip",
            action: NextAction::PracticeMore,
            delta: 0.0,
            ask_confidence: false,
        },
        ResponsePattern::MethodError => BaseRule {
            kind: MomentType::Hint,
            message: "hint.method_review",
            action: NextAction::ReviewBasics,
            delta: -1.0,
            ask_confidence: false,
        },
        ResponsePattern::CompletelyLost => BaseRule {
            kind: MomentType::Hint,
            message: "hint.step_back",
            action: NextAction::ReviewBasics,
            delta: -2.0,
            ask_confidence: false,
        },
        ResponsePattern::PseudoActivity => BaseRule {
            kind: MomentType::Encouragement,
            message: "encouragement.refocus",
            action: NextAction::PracticeMore,
            delta: 0.0,
            ask_confidence: false,
        },
    }
}

/// Turns the classified answer and the learner's state into one bounded
/// instructional action.
pub struct TeachingPolicy {
    params: DecisionParams,
    age: AgeProfiles,
}

impl TeachingPolicy {
    pub fn new(params: DecisionParams, age: AgeProfiles) -> Self {
        Self { params, age }
    }

    pub fn decide(
        &self,
        pattern: ResponsePattern,
        profile: &StudentProfile,
        flow: &FlowStateIndicators,
        phase: ScaffoldingPhase,
        ctx: &DecisionContext<'_>,
    ) -> TeachingMoment {
        let rule = base_rule(pattern);
        let age = self.age.for_group(profile.age_group);

        let mut kind = rule.kind;
        let mut action = rule.action;
        let mut delta = rule.delta;
        let mut notes = Vec::new();
        let mut focus_areas = BTreeSet::new();

        if ctx.emotional.frustration >= self.params.break_frustration {
            kind = MomentType::Intervention;
            action = NextAction::BreakSuggestion;
            delta = delta.min(0.0);
            notes.push("intervention.break_suggestion".to_string());
        } else if ctx.emotional.engagement < self.params.context_change_engagement {
            kind = MomentType::Encouragement;
            action = NextAction::ContextChange;
            delta = delta.min(0.0);
            notes.push("encouragement.context_change".to_string());
        } else if profile.consecutive_incorrect >= self.params.prerequisite_incorrect_streak {
            kind = MomentType::PrerequisiteCheck;
            action = NextAction::PrerequisiteReview;
            delta = delta.min(-1.0);
            notes.push("prerequisite.check".to_string());
            focus_areas.extend(profile.knowledge_gaps.iter().cloned());
        }

        if action == NextAction::ReviewBasics && phase >= ScaffoldingPhase::IndependentPractice {
            action = NextAction::Review;
            notes.push("phase.review".to_string());
        }

        if flow.cognitive_load > age.load_threshold {
            notes.push("load.simplify_presentation".to_string());
        }

        if pattern.is_error() {
            focus_areas.insert(ctx.skill_id.to_string());
        }

        if let Some(analysis) = ctx.math_error {
            if !analysis.pedagogical_response.is_empty() {
                notes.push(analysis.pedagogical_response.clone());
            }
            if !analysis.error_type.is_empty() {
                focus_areas.insert(analysis.error_type.clone());
            }
            if analysis.requires_intervention {
                kind = MomentType::Intervention;
            }
        }

        match ctx.phase_transition {
            PhaseTransition::Advanced {
                to: ScaffoldingPhase::MasteryCheck,
                ..
            } if kind == MomentType::Praise => {
                kind = MomentType::Checkpoint;
                notes.push("checkpoint.mastery_check".to_string());
            }
            PhaseTransition::Mastered if kind == MomentType::Praise => {
                kind = MomentType::Checkpoint;
                notes.push("checkpoint.skill_mastered".to_string());
            }
            _ => {}
        }

        let damped = delta * age.difficulty_damping;
        let difficulty_adjustment = damped.clamp(-self.params.max_step, self.params.max_step);

        let generate_more_problems = match action {
            NextAction::PracticeMore => self.params.practice_more_problems,
            NextAction::ReviewBasics | NextAction::PrerequisiteReview | NextAction::Review => {
                self.params.review_problems
            }
            _ => 0,
        };

        TeachingMoment {
            kind,
            message: rule.message.to_string(),
            notes,
            next_action: action,
            focus_areas,
            difficulty_adjustment,
            generate_more_problems,
            ask_confidence_rating: rule.ask_confidence,
        }
    }
}

impl Default for TeachingPolicy {
    fn default() -> Self {
        Self::new(DecisionParams::default(), AgeProfiles::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutor::modeling::flow::FlowStateCalculator;
    use crate::tutor::types::AgeGroup;

    fn calm() -> EmotionalState {
        EmotionalState {
            frustration: 10.0,
            engagement: 70.0,
            confidence: 60.0,
        }
    }

    fn decide(pattern: ResponsePattern, profile: &StudentProfile, emotional: &EmotionalState) -> TeachingMoment {
        let policy = TeachingPolicy::default();
        let flow = FlowStateCalculator::default().compute(5000.0, profile);
        policy.decide(
            pattern,
            profile,
            &flow,
            ScaffoldingPhase::GuidedPractice,
            &DecisionContext {
                skill_id: "fractions.add",
                emotional,
                phase_transition: PhaseTransition::Stay,
                math_error: None,
            },
        )
    }

    #[test]
    fn test_pattern_table() {
        let profile = StudentProfile::default();
        let cases = [
            (ResponsePattern::QuickCorrect, NextAction::IncreaseDifficulty, 2.0),
            (ResponsePattern::SlowCorrect, NextAction::Continue, 0.0),
            (ResponsePattern::HesitantCorrect, NextAction::Continue, 0.0),
            (ResponsePattern::ComputationalError, NextAction::PracticeMore, 0.0),
            (ResponsePattern::MethodError, NextAction::ReviewBasics, -1.0),
            (ResponsePattern::CompletelyLost, NextAction::ReviewBasics, -2.0),
            (ResponsePattern::PseudoActivity, NextAction::PracticeMore, 0.0),
        ];
        for (pattern, action, delta) in cases {
            let moment = decide(pattern, &profile, &calm());
            assert_eq!(moment.next_action, action, "{}", pattern.as_str());
            assert_eq!(moment.difficulty_adjustment, delta, "{}", pattern.as_str());
        }
    }

    #[test]
    fn test_hesitant_asks_for_confidence() {
        let moment = decide(ResponsePattern::HesitantCorrect, &StudentProfile::default(), &calm());
        assert!(moment.ask_confidence_rating);
        assert_eq!(moment.kind, MomentType::Encouragement);
    }

    #[test]
    fn test_elementary_damping() {
        let profile = StudentProfile {
            age_group: AgeGroup::Elementary,
            ..Default::default()
        };
        let up = decide(ResponsePattern::QuickCorrect, &profile, &calm());
        assert!((up.difficulty_adjustment - 1.4).abs() < 1e-9);
        let down = decide(ResponsePattern::CompletelyLost, &profile, &calm());
        assert!((down.difficulty_adjustment + 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_break_suggestion_overrides() {
        let emotional = EmotionalState {
            frustration: 80.0,
            engagement: 10.0,
            confidence: 10.0,
        };
        let moment = decide(ResponsePattern::QuickCorrect, &StudentProfile::default(), &emotional);
        assert_eq!(moment.next_action, NextAction::BreakSuggestion);
        assert_eq!(moment.kind, MomentType::Intervention);
        assert_eq!(moment.message, "praise.quick_correct");
        assert!(moment.difficulty_adjustment <= 0.0);
    }

    #[test]
    fn test_context_change_on_low_engagement() {
        let emotional = EmotionalState {
            frustration: 20.0,
            engagement: 25.0,
            confidence: 50.0,
        };
        let moment = decide(ResponsePattern::PseudoActivity, &StudentProfile::default(), &emotional);
        assert_eq!(moment.next_action, NextAction::ContextChange);
    }

    #[test]
    fn test_prerequisite_review_after_three_incorrect() {
        let profile = StudentProfile {
            consecutive_incorrect: 3,
            ..Default::default()
        };
        let moment = decide(ResponsePattern::ComputationalError, &profile, &calm());
        assert_eq!(moment.next_action, NextAction::PrerequisiteReview);
        assert_eq!(moment.kind, MomentType::PrerequisiteCheck);
        assert!(moment.notes.contains(&"prerequisite.check".to_string()));
        assert_eq!(moment.difficulty_adjustment, -1.0);
        assert_eq!(moment.generate_more_problems, 2);
    }

    #[test]
    fn test_review_in_late_phases() {
        let policy = TeachingPolicy::default();
        let profile = StudentProfile::default();
        let flow = FlowStateCalculator::default().compute(5000.0, &profile);
        let moment = policy.decide(
            ResponsePattern::MethodError,
            &profile,
            &flow,
            ScaffoldingPhase::IndependentPractice,
            &DecisionContext {
                skill_id: "s",
                emotional: &calm(),
                phase_transition: PhaseTransition::Stay,
                math_error: None,
            },
        );
        assert_eq!(moment.next_action, NextAction::Review);
    }

    #[test]
    fn test_math_error_collaborator_merges_into_moment() {
        let policy = TeachingPolicy::default();
        let profile = StudentProfile::default();
        let flow = FlowStateCalculator::default().compute(5000.0, &profile);
        let analysis = MathErrorAnalysis {
            error_type: "sign_error".to_string(),
            pedagogical_response: "hint.check_signs".to_string(),
            difficulty_adjustment: -2.0,
            requires_intervention: true,
        };
        let moment = policy.decide(
            ResponsePattern::ComputationalError,
            &profile,
            &flow,
            ScaffoldingPhase::GuidedPractice,
            &DecisionContext {
                skill_id: "integers.sub",
                emotional: &calm(),
                phase_transition: PhaseTransition::Stay,
                math_error: Some(&analysis),
            },
        );
        assert_eq!(moment.kind, MomentType::Intervention);
        assert!(moment.focus_areas.contains("sign_error"));
        assert!(moment.focus_areas.contains("integers.sub"));
        assert!(moment.notes.contains(&"hint.check_signs".to_string()));
        // the pattern table stays the single source of the difficulty step
        assert_eq!(moment.difficulty_adjustment, 0.0);
    }

    #[test]
    fn test_checkpoint_on_mastery() {
        let policy = TeachingPolicy::default();
        let profile = StudentProfile::default();
        let flow = FlowStateCalculator::default().compute(5000.0, &profile);
        let moment = policy.decide(
            ResponsePattern::SlowCorrect,
            &profile,
            &flow,
            ScaffoldingPhase::MasteryCheck,
            &DecisionContext {
                skill_id: "s",
                emotional: &calm(),
                phase_transition: PhaseTransition::Mastered,
                math_error: None,
            },
        );
        assert_eq!(moment.kind, MomentType::Checkpoint);
    }
}
