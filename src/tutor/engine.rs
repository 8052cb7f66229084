use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{ProfileStore, StoreError};
use crate::tutor::collaborators::{
    LearnerDataSource, LearnerSnapshot, MathErrorClassifier, NoLearnerData,
};
use crate::tutor::config::TutorConfig;
use crate::tutor::decision::{DecisionContext, PhaseMachine, TeachingPolicy};
use crate::tutor::modeling::{
    classify_zone, zpd_alignment, CognitiveProfileBuilder, EmotionEstimator, EmotionInput,
    FlowStateCalculator, ResponseClassifier,
};
use crate::tutor::persistence::TutorPersistence;
use crate::tutor::types::{
    AnswerEvent, InteractionOutcome, NextAction, PhaseState, ProfileSnippet, ResponseContext,
    StudentProfile,
};
use crate::tutor::updater::{InteractionRecord, ProfileUpdater};

const DEFAULT_STRATEGY: &str = "standard";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub profile: StudentProfile,
    pub version: i64,
}

/// Runs the per-answer pipeline: classify, estimate state, decide, fold back
/// into the stored profile. Interactions for one user are serialized.
pub struct TutorEngine {
    config: TutorConfig,
    classifier: ResponseClassifier,
    builder: CognitiveProfileBuilder,
    flow: FlowStateCalculator,
    emotion: EmotionEstimator,
    phases: PhaseMachine,
    policy: TeachingPolicy,
    updater: ProfileUpdater,
    persistence: TutorPersistence,
    learner_data: Arc<dyn LearnerDataSource>,
    math_errors: Option<Arc<dyn MathErrorClassifier>>,
    user_locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TutorEngine {
    pub fn new(config: TutorConfig, store: Arc<dyn ProfileStore>) -> Self {
        let persistence = TutorPersistence::new(
            store,
            config.persistence.clone(),
            config.updater.clone(),
        );
        Self {
            classifier: ResponseClassifier::new(config.classifier.clone()),
            builder: CognitiveProfileBuilder::new(config.age.clone(), config.builder.clone()),
            flow: FlowStateCalculator::new(config.age.clone()),
            emotion: EmotionEstimator::new(config.emotion.clone()),
            phases: PhaseMachine::new(config.phase.clone()),
            policy: TeachingPolicy::new(config.decision.clone(), config.age.clone()),
            updater: ProfileUpdater::new(
                config.updater.clone(),
                config.age.clone(),
                config.builder.clone(),
            ),
            persistence,
            learner_data: Arc::new(NoLearnerData),
            math_errors: None,
            user_locks: parking_lot::Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn with_learner_data(mut self, source: Arc<dyn LearnerDataSource>) -> Self {
        self.learner_data = source;
        self
    }

    pub fn with_math_error_classifier(mut self, classifier: Arc<dyn MathErrorClassifier>) -> Self {
        self.math_errors = Some(classifier);
        self
    }

    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    pub fn persistence(&self) -> &TutorPersistence {
        &self.persistence
    }

    pub async fn process_answer(
        &self,
        user_id: &str,
        event: AnswerEvent,
    ) -> Result<InteractionOutcome, EngineError> {
        validate(user_id, &event)?;

        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.process_locked(user_id, &event).await
        };
        drop(lock);
        self.release_lock(user_id);
        result
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileView>, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("user_id must not be empty".to_string()));
        }
        let loaded = self.persistence.load(user_id).await?;
        Ok(loaded.profile.map(|profile| ProfileView {
            profile,
            version: loaded.version,
        }))
    }

    async fn process_locked(
        &self,
        user_id: &str,
        event: &AnswerEvent,
    ) -> Result<InteractionOutcome, EngineError> {
        let interaction_id = uuid::Uuid::new_v4().to_string();
        let timestamp = event
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let max_attempts = self.config.persistence.max_conflict_retries;

        let mut attempt = 0;
        let mut pending: Option<InteractionOutcome> = None;
        loop {
            let loaded = self.persistence.load(user_id).await?;

            // a save that timed out may still have landed
            if let Some(mut outcome) = pending.take() {
                if loaded.last_interaction_id.as_deref() == Some(interaction_id.as_str()) {
                    outcome.version = loaded.version;
                    if let Some(profile) = loaded.profile {
                        outcome.profile = profile;
                    }
                    return Ok(outcome);
                }
            }

            let mut profile = match loaded.profile {
                Some(profile) => profile,
                None => self.initial_profile(user_id).await,
            };

            let mut outcome = self.fold(&mut profile, event, &interaction_id, timestamp);

            match self
                .persistence
                .save(user_id, &profile, loaded.version, &interaction_id)
                .await
            {
                Ok(version) => {
                    outcome.version = version;
                    info!(
                        user_id,
                        skill_id = %event.skill_id,
                        pattern = outcome.pattern.as_str(),
                        next_action = outcome.teaching_moment.next_action.as_str(),
                        difficulty = outcome.profile.difficulty_level,
                        version,
                        "answer processed"
                    );
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    attempt += 1;
                    warn!(user_id, attempt, "profile version conflict, re-folding interaction");
                    pending = Some(outcome);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Pure in-memory part of the pipeline. Mutates `profile` into its
    /// post-interaction state.
    fn fold(
        &self,
        profile: &mut StudentProfile,
        event: &AnswerEvent,
        interaction_id: &str,
        timestamp: i64,
    ) -> InteractionOutcome {
        let rt = event.response_time_ms;
        let classification = self.classifier.classify(
            &event.user_answer,
            &event.expected_answer,
            rt,
            event.is_correct,
            profile,
        );
        let pattern = classification.pattern;
        let quick_threshold = self.classifier.quick_threshold(profile);
        let flow = self.flow.compute(rt, profile);
        let zpd = zpd_alignment(pattern, profile.correctness_rate, &self.config.zpd);
        let zpd_zone = classify_zone(pattern, profile.correctness_rate, &self.config.zpd);

        self.updater.record_outcome(profile, event.is_correct, pattern);

        let emotional = self.emotion.estimate(&EmotionInput {
            profile: &*profile,
            flow: &flow,
            pattern,
            time_pressure: event.time_pressure,
            self_reported_confidence: event.self_reported_confidence,
        });

        let mut phase_state = profile
            .scaffolding
            .remove(&event.skill_id)
            .unwrap_or_else(|| PhaseState {
                entered_at: timestamp,
                ..Default::default()
            });
        self.phases.record_outcome(&mut phase_state, event.is_correct);
        let mut transition = self
            .phases
            .evaluate(&mut phase_state, emotional.confidence, timestamp);

        let math_error = if event.is_correct {
            None
        } else {
            self.math_errors.as_ref().and_then(|c| {
                c.classify(&event.user_answer, &event.expected_answer, &event.skill_id, rt)
            })
        };

        let moment = self.policy.decide(
            pattern,
            profile,
            &flow,
            phase_state.phase,
            &DecisionContext {
                skill_id: &event.skill_id,
                emotional: &emotional,
                phase_transition: transition,
                math_error: math_error.as_ref(),
            },
        );

        if moment.next_action == NextAction::Review {
            transition = self.phases.review(&mut phase_state, timestamp);
        }
        let phase = phase_state.phase;
        profile.scaffolding.insert(event.skill_id.clone(), phase_state);

        let strategy = event
            .strategy
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_STRATEGY);
        self.updater.apply(
            profile,
            &InteractionRecord {
                skill_id: &event.skill_id,
                timestamp,
                response_time_ms: rt,
                is_correct: event.is_correct,
                pattern,
                strategy,
                quick_threshold,
                flow: &flow,
                emotional: &emotional,
                difficulty_adjustment: moment.difficulty_adjustment,
                phase_transition: transition,
                misconception: math_error
                    .as_ref()
                    .map(|m| m.error_type.as_str())
                    .filter(|t| !t.is_empty()),
            },
        );

        debug!(
            pattern = pattern.as_str(),
            phase = phase.as_str(),
            frustration = emotional.frustration,
            engagement = emotional.engagement,
            cognitive_load = flow.cognitive_load,
            "interaction folded"
        );

        let response_context = ResponseContext {
            teaching_moment: moment.clone(),
            flow_summary: flow.snapshot(),
            emotional_state: emotional,
            profile_snippet: ProfileSnippet::from_profile(profile),
        };

        InteractionOutcome {
            interaction_id: interaction_id.to_string(),
            pattern,
            confidence: classification.confidence,
            flow,
            emotional_state: emotional,
            zpd_alignment: zpd,
            zpd_zone,
            phase,
            phase_transition: transition,
            teaching_moment: moment,
            profile: profile.clone(),
            response_context,
            version: 0,
        }
    }

    async fn initial_profile(&self, user_id: &str) -> StudentProfile {
        let snapshot = match self.learner_data.snapshot(user_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(user_id, error = %e, "learner data unavailable, building profile from defaults");
                LearnerSnapshot::default()
            }
        };
        self.builder.build(
            &snapshot.base,
            &snapshot.progress,
            snapshot.diagnostic.as_ref(),
            snapshot.telemetry.as_ref(),
        )
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock();
        Arc::clone(
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn release_lock(&self, user_id: &str) {
        let mut locks = self.user_locks.lock();
        if let Some(lock) = locks.get(user_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(user_id);
            }
        }
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.user_locks.lock().len()
    }
}

fn validate(user_id: &str, event: &AnswerEvent) -> Result<(), EngineError> {
    if user_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("user_id must not be empty".to_string()));
    }
    if event.skill_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("skillId must not be empty".to_string()));
    }
    if !event.response_time_ms.is_finite() || event.response_time_ms < 0.0 {
        return Err(EngineError::InvalidInput(
            "responseTimeMs must be a non-negative number".to_string(),
        ));
    }
    if let Some(rating) = event.self_reported_confidence {
        if !(1..=10).contains(&rating) {
            return Err(EngineError::InvalidInput(
                "selfReportedConfidence must be between 1 and 10".to_string(),
            ));
        }
    }
    Ok(())
}
