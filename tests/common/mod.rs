#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Response;
use axum::Router;

use tutor_engine::db::InMemoryProfileStore;
use tutor_engine::tutor::{AnswerEvent, TutorConfig, TutorEngine};

pub const FIXED_TIMESTAMP: i64 = 1_700_000_000_000;

/// Defaults with millisecond backoff so retry paths stay fast.
pub fn test_config() -> TutorConfig {
    let mut config = TutorConfig::default();
    config.persistence.base_backoff_ms = 1;
    config.persistence.timeout_ms = 1000;
    config
}

pub fn create_test_engine() -> Arc<TutorEngine> {
    Arc::new(TutorEngine::new(
        test_config(),
        Arc::new(InMemoryProfileStore::new()),
    ))
}

pub fn create_test_app() -> Router {
    tutor_engine::create_app_with_engine(create_test_engine())
}

pub fn answer(user_answer: &str, expected: &str, rt: f64, is_correct: bool) -> AnswerEvent {
    AnswerEvent {
        skill_id: "fractions.add".to_string(),
        user_answer: user_answer.to_string(),
        expected_answer: expected.to_string(),
        response_time_ms: rt,
        is_correct,
        strategy: None,
        time_pressure: false,
        self_reported_confidence: None,
        timestamp: Some(FIXED_TIMESTAMP),
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
