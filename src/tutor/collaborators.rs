//! Ports for the external systems the engine consults but does not own.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tutor::modeling::profile_builder::{
    BaseProfileRecord, CognitiveTelemetry, DiagnosticSession, SkillProgress,
};

/// Verdict of the detailed math-error taxonomy service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathErrorAnalysis {
    pub error_type: String,
    pub pedagogical_response: String,
    pub difficulty_adjustment: f64,
    pub requires_intervention: bool,
}

pub trait MathErrorClassifier: Send + Sync {
    fn classify(
        &self,
        user_answer: &str,
        expected_answer: &str,
        skill_id: &str,
        response_time_ms: f64,
    ) -> Option<MathErrorAnalysis>;
}

/// Aggregates the profile builder falls back on when no stored profile exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerSnapshot {
    pub base: BaseProfileRecord,
    pub progress: SkillProgress,
    pub diagnostic: Option<DiagnosticSession>,
    pub telemetry: Option<CognitiveTelemetry>,
}

#[derive(Debug, Error)]
pub enum LearnerDataError {
    #[error("learner data source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed learner data: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LearnerDataSource: Send + Sync {
    async fn snapshot(&self, user_id: &str) -> Result<LearnerSnapshot, LearnerDataError>;
}

/// Used when no aggregate source is wired in; every builder field falls back.
pub struct NoLearnerData;

#[async_trait]
impl LearnerDataSource for NoLearnerData {
    async fn snapshot(&self, _user_id: &str) -> Result<LearnerSnapshot, LearnerDataError> {
        Ok(LearnerSnapshot::default())
    }
}

#[derive(Default)]
pub struct InMemoryLearnerData {
    snapshots: RwLock<HashMap<String, LearnerSnapshot>>,
}

impl InMemoryLearnerData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, snapshot: LearnerSnapshot) {
        self.snapshots.write().insert(user_id.into(), snapshot);
    }
}

#[async_trait]
impl LearnerDataSource for InMemoryLearnerData {
    async fn snapshot(&self, user_id: &str) -> Result<LearnerSnapshot, LearnerDataError> {
        Ok(self
            .snapshots
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
