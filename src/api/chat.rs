//! Chat proxy endpoint
//!
//! `POST /chat` forwards `{message}` to the generation service as
//! `{prompt}` and relays the reply as `{reply}`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;

/// Message returned to the browser for any upstream failure
pub const UPSTREAM_ERROR_MESSAGE: &str = "AI server response error";

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Chat request from the browser
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Chat reply to the browser
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    let reply = state
        .generate
        .generate(&request.message)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "generation service call failed");
            ChatError::Upstream
        })?;

    Ok(Json(ChatResponse { reply }))
}

/// Chat proxy errors
#[derive(Debug)]
pub enum ChatError {
    /// The generation service failed or replied with something unusable
    Upstream,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        match self {
            Self::Upstream => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: UPSTREAM_ERROR_MESSAGE,
                }),
            )
                .into_response(),
        }
    }
}
