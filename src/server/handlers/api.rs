use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::{AnswerMode, AppState};

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    #[serde(default = "default_mode")]
    pub mode: AnswerMode,
}

fn default_mode() -> AnswerMode {
    AnswerMode::Crew
}

pub async fn answer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let answer = state.answer(question, payload.mode).await?;
    let record = state
        .history
        .record_answer(question, payload.mode, &answer)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(json!({
        "id": record.id,
        "question": record.question,
        "mode": record.mode,
        "answer": record.answer,
    })))
}

pub async fn generate_questions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let content = state.generate_questions().await?;
    let record = state
        .history
        .record_questions(&content)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(json!({
        "id": record.id,
        "content": record.content,
    })))
}

pub async fn history(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let answers = state.history.answers().await.map_err(ApiError::internal)?;
    let questions = state
        .history
        .generated_questions()
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(json!({
        "answers": answers,
        "generated_questions": questions,
    })))
}
