//! Chat endpoint
//!
//! POST /chat — free-text question in, natural-language answer out, raw
//! query rows attached when the planner ran one.

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::db::Row;
use crate::error::{ApiError, ApiResult};
use crate::services::ChatTurn;
use crate::AppState;

/// POST /chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Json(turn): Json<ChatTurn>,
) -> ApiResult<Json<ChatResponse>> {
    if turn.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }

    tracing::info!(
        has_context_plate = turn.context_plate.is_some(),
        history_len = turn.history.len(),
        "Chat request received"
    );

    let outcome = match state.chat.run(&turn).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let api_error = ApiError::from(err);
            if api_error.is_server_error() {
                state.record_error(api_error.to_string()).await;
            }
            return Err(api_error);
        }
    };

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        data: outcome.data,
    }))
}

/// Build chat routes
pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}
