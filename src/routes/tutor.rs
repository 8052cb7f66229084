use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::response::{AppError, SuccessResponse};
use crate::state::AppState;
use crate::tutor::types::{AnswerEvent, StudentProfile};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/answers", post(submit_answer))
        .route("/users/:user_id/profile", get(get_profile))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    user_id: String,
    version: i64,
    profile: StudentProfile,
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<AnswerEvent>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(event) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let outcome = state.engine().process_answer(&user_id, event).await?;
    Ok(SuccessResponse::new(outcome).into_response())
}

async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    let view = state
        .engine()
        .get_profile(&user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no profile for user {user_id}")))?;

    Ok(SuccessResponse::new(ProfileResponse {
        user_id,
        version: view.version,
        profile: view.profile,
    })
    .into_response())
}
