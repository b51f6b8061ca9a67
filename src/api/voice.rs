//! Speech chat endpoints
//!
//! `POST /chat-text` answers a transcript with text and synthesized audio;
//! `POST /chat-audio` transcribes recorded audio first.

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
use crate::config::validate_voice;
use crate::speech::{SpeechClient, SpokenReply};
use crate::Error;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat-text", post(chat_text))
        .route("/chat-audio", post(chat_audio))
        .with_state(state)
}

/// Text turn from the browser
#[derive(Debug, Deserialize)]
pub struct ChatTextRequest {
    pub text: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Recorded audio turn
#[derive(Debug, Deserialize)]
pub struct ChatAudioRequest {
    /// Base64 WAV audio
    pub audio_base64: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Spoken reply
#[derive(Debug, Serialize)]
pub struct ChatSpeechResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_text: Option<String>,
    pub text: String,
    pub audio_base64: String,
}

async fn chat_text(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatTextRequest>,
) -> Result<Json<ChatSpeechResponse>, VoiceError> {
    if request.text.trim().is_empty() {
        return Err(VoiceError::BadRequest("Empty text".to_string()));
    }

    let speech = speech_client(&state)?;

    let (system_prompt, voice) =
        resolve_options(&state, request.system_prompt.as_deref(), request.voice.as_deref())?;

    let reply = speech
        .chat_and_speak(&request.text, system_prompt, voice)
        .await
        .map_err(|e| VoiceError::ChatFailed(e.to_string()))?;

    if reply.text.is_empty() {
        return Ok(Json(ChatSpeechResponse {
            user_text: None,
            text: String::new(),
            audio_base64: String::new(),
        }));
    }

    Ok(Json(spoken_response(request.text, reply)))
}

async fn chat_audio(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatAudioRequest>,
) -> Result<Json<ChatSpeechResponse>, VoiceError> {
    if request.audio_base64.trim().is_empty() {
        return Err(VoiceError::BadRequest("Empty audio data".to_string()));
    }

    let speech = speech_client(&state)?;

    let (system_prompt, voice) =
        resolve_options(&state, request.system_prompt.as_deref(), request.voice.as_deref())?;

    let user_text = speech
        .transcribe(&request.audio_base64)
        .await
        .map_err(|e| match e {
            Error::Base64(e) => VoiceError::BadRequest(format!("Invalid base64 audio: {e}")),
            other => VoiceError::TranscriptionFailed(other.to_string()),
        })?;

    // silence transcribes to nothing
    if user_text.trim().is_empty() {
        return Err(VoiceError::BadRequest("No speech recognized".to_string()));
    }

    let reply = speech
        .chat_and_speak(&user_text, system_prompt, voice)
        .await
        .map_err(|e| VoiceError::ChatFailed(e.to_string()))?;

    Ok(Json(spoken_response(user_text, reply)))
}

fn speech_client(state: &ApiState) -> Result<&SpeechClient, VoiceError> {
    state
        .speech
        .as_ref()
        .ok_or(VoiceError::NotConfigured("Speech chat not configured (no API key)"))
}

/// Pick request options or fall back to configured defaults
fn resolve_options<'a>(
    state: &'a ApiState,
    system_prompt: Option<&'a str>,
    voice: Option<&'a str>,
) -> Result<(&'a str, &'a str), VoiceError> {
    let system_prompt = system_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(state.default_system_prompt.as_str());

    let voice = voice
        .filter(|v| !v.is_empty())
        .unwrap_or(state.default_voice.as_str());
    validate_voice(voice).map_err(|e| VoiceError::BadRequest(e.to_string()))?;

    Ok((system_prompt, voice))
}

fn spoken_response(user_text: String, reply: SpokenReply) -> ChatSpeechResponse {
    ChatSpeechResponse {
        user_text: Some(user_text),
        text: reply.text,
        audio_base64: reply.audio_base64,
    }
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    NotConfigured(&'static str),
    BadRequest(String),
    TranscriptionFailed(String),
    ChatFailed(String),
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::TranscriptionFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transcription_failed", msg)
            }
            Self::ChatFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "chat_failed", msg),
        };

        if status.is_server_error() {
            tracing::error!(code, message = %message, "speech chat failed");
        }

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}
