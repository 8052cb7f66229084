use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::db::{ProfileStore, StoreError};
use crate::tutor::config::{PersistenceParams, UpdaterParams};
use crate::tutor::types::{
    AgeGroup, CognitiveStyle, Emotion, ExplanationStyle, LearningPatterns, PerformanceTrends,
    PhaseState, SessionRecord, StudentProfile,
};

pub const SCHEMA_VERSION: u32 = 1;

/// Scalar and set-valued part of the persisted profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitiveProfileRecord {
    pub average_response_time: f64,
    pub correctness_rate: f64,
    pub common_mistakes: BTreeSet<String>,
    pub knowledge_gaps: BTreeSet<String>,
    pub preferred_explanation_style: ExplanationStyle,
    pub difficulty_level: f64,
    pub working_memory_capacity: f64,
    pub processing_speed: f64,
    pub attention_regulation_index: f64,
    pub inhibitory_control_index: f64,
    pub cognitive_flexibility_index: f64,
    pub self_efficacy: f64,
    pub persistence_index: f64,
    pub age_group: AgeGroup,
    pub class_level: u8,
    pub attention_span_minutes: u32,
    pub cognitive_style: CognitiveStyle,
    pub active_misconceptions: BTreeSet<String>,
    pub recent_emotions: VecDeque<Emotion>,
}

impl Default for CognitiveProfileRecord {
    fn default() -> Self {
        Self::from(&StudentProfile::default())
    }
}

impl From<&StudentProfile> for CognitiveProfileRecord {
    fn from(p: &StudentProfile) -> Self {
        Self {
            average_response_time: p.average_response_time,
            correctness_rate: p.correctness_rate,
            common_mistakes: p.common_mistakes.clone(),
            knowledge_gaps: p.knowledge_gaps.clone(),
            preferred_explanation_style: p.preferred_explanation_style,
            difficulty_level: p.difficulty_level,
            working_memory_capacity: p.working_memory_capacity,
            processing_speed: p.processing_speed,
            attention_regulation_index: p.attention_regulation_index,
            inhibitory_control_index: p.inhibitory_control_index,
            cognitive_flexibility_index: p.cognitive_flexibility_index,
            self_efficacy: p.self_efficacy,
            persistence_index: p.persistence_index,
            age_group: p.age_group,
            class_level: p.class_level,
            attention_span_minutes: p.attention_span_minutes,
            cognitive_style: p.cognitive_style,
            active_misconceptions: p.active_misconceptions.clone(),
            recent_emotions: p.recent_emotions.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileCounters {
    pub consecutive_correct: u32,
    pub consecutive_incorrect: u32,
    pub pseudo_activity_streak: u32,
    pub interaction_count: u64,
}

/// Versioned on-disk shape of a learner profile. Every field defaults, so
/// partial or older documents still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDocument {
    #[serde(alias = "schemaVersion")]
    pub schema_version: u32,
    pub cognitive_profile: CognitiveProfileRecord,
    pub recent_sessions: VecDeque<SessionRecord>,
    pub learning_patterns: LearningPatterns,
    pub performance_trends: PerformanceTrends,
    pub scaffolding: BTreeMap<String, PhaseState>,
    pub counters: ProfileCounters,
    pub last_interaction_id: Option<String>,
}

impl Default for ProfileDocument {
    fn default() -> Self {
        Self::from_profile(&StudentProfile::default(), None)
    }
}

impl ProfileDocument {
    pub fn from_profile(profile: &StudentProfile, interaction_id: Option<&str>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            cognitive_profile: CognitiveProfileRecord::from(profile),
            recent_sessions: profile.recent_sessions.clone(),
            learning_patterns: profile.learning_patterns.clone(),
            performance_trends: profile.performance_trends.clone(),
            scaffolding: profile.scaffolding.clone(),
            counters: ProfileCounters {
                consecutive_correct: profile.consecutive_correct,
                consecutive_incorrect: profile.consecutive_incorrect,
                pseudo_activity_streak: profile.pseudo_activity_streak,
                interaction_count: profile.interaction_count,
            },
            last_interaction_id: interaction_id.map(str::to_string),
        }
    }

    /// Rebuilds the in-memory profile, re-applying every bound on the way in.
    pub fn into_profile(self, limits: &UpdaterParams) -> StudentProfile {
        let c = self.cognitive_profile;
        let mut profile = StudentProfile {
            average_response_time: c.average_response_time,
            correctness_rate: c.correctness_rate,
            common_mistakes: c.common_mistakes,
            knowledge_gaps: c.knowledge_gaps,
            preferred_explanation_style: c.preferred_explanation_style,
            difficulty_level: c.difficulty_level,
            working_memory_capacity: c.working_memory_capacity,
            processing_speed: c.processing_speed,
            attention_regulation_index: c.attention_regulation_index,
            inhibitory_control_index: c.inhibitory_control_index,
            cognitive_flexibility_index: c.cognitive_flexibility_index,
            self_efficacy: c.self_efficacy,
            persistence_index: c.persistence_index,
            age_group: c.age_group,
            class_level: c.class_level,
            attention_span_minutes: c.attention_span_minutes,
            cognitive_style: c.cognitive_style,
            active_misconceptions: c.active_misconceptions,
            recent_emotions: c.recent_emotions,
            recent_sessions: self.recent_sessions,
            learning_patterns: self.learning_patterns,
            performance_trends: self.performance_trends,
            consecutive_correct: self.counters.consecutive_correct,
            consecutive_incorrect: self.counters.consecutive_incorrect,
            pseudo_activity_streak: self.counters.pseudo_activity_streak,
            interaction_count: self.counters.interaction_count,
            scaffolding: self.scaffolding,
        };

        while profile.recent_sessions.len() > limits.session_cap() {
            profile.recent_sessions.pop_front();
        }
        while profile.recent_emotions.len() > limits.emotion_limit {
            profile.recent_emotions.pop_front();
        }
        profile.normalize();
        profile
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadedProfile {
    pub profile: Option<StudentProfile>,
    /// 0 when nothing is stored yet.
    pub version: i64,
    pub last_interaction_id: Option<String>,
}

/// Bounded, retried access to the profile store.
pub struct TutorPersistence {
    store: Arc<dyn ProfileStore>,
    params: PersistenceParams,
    limits: UpdaterParams,
}

impl TutorPersistence {
    pub fn new(store: Arc<dyn ProfileStore>, params: PersistenceParams, limits: UpdaterParams) -> Self {
        Self {
            store,
            params,
            limits,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.with_timeout(self.store.health_check()).await
    }

    pub async fn load(&self, user_id: &str) -> Result<LoadedProfile, StoreError> {
        let stored = self
            .with_retry("load", user_id, || self.store.load(user_id))
            .await?;

        let Some(stored) = stored else {
            return Ok(LoadedProfile::default());
        };

        let document: ProfileDocument = serde_json::from_value(stored.document)?;
        if document.schema_version > SCHEMA_VERSION {
            warn!(
                user_id,
                schema_version = document.schema_version,
                "profile document written by a newer schema, unknown fields ignored"
            );
        }
        let last_interaction_id = document.last_interaction_id.clone();

        Ok(LoadedProfile {
            profile: Some(document.into_profile(&self.limits)),
            version: stored.version,
            last_interaction_id,
        })
    }

    /// Single write-back of the folded profile. Conflicts are returned as-is
    /// for the caller to re-fold.
    pub async fn save(
        &self,
        user_id: &str,
        profile: &StudentProfile,
        expected_version: i64,
        interaction_id: &str,
    ) -> Result<i64, StoreError> {
        let document = serde_json::to_value(ProfileDocument::from_profile(profile, Some(interaction_id)))?;
        self.with_retry("save", user_id, || {
            self.store.save(user_id, &document, expected_version)
        })
        .await
    }

    async fn with_timeout<T, Fut>(&self, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let limit = Duration::from_millis(self.params.timeout_ms);
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.params.timeout_ms)),
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, user_id: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_retries = self.params.max_retries;
        let mut retry = 0;
        loop {
            match self.with_timeout(call()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry < max_retries => {
                    let backoff = backoff_with_jitter(self.params.base_backoff_ms, retry);
                    warn!(retry, op, user_id, error = %e, "profile store call failed, retrying");
                    tokio::time::sleep(backoff).await;
                    retry += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!(op, user_id, retries = retry, error = %e, "profile store call failed");
                    }
                    return Err(e);
                }
            }
        }
    }
}

fn backoff_with_jitter(base_ms: u64, retry: usize) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << retry.min(16));
    let jitter = if base_ms > 1 {
        rand::rng().random_range(0..=base_ms / 2)
    } else {
        0
    };
    Duration::from_millis(exp.saturating_add(jitter))
}
