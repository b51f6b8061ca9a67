//! Speech chat client for an OpenAI-compatible API
//!
//! Produces a spoken reply (transcript plus base64 MP3) for a user turn, and
//! transcribes recorded audio to text.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::SpeechConfig;
use crate::{Error, Result};

/// A model reply with optional synthesized audio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpokenReply {
    /// Reply text (audio transcript when audio was produced)
    pub text: String,

    /// Base64 MP3 audio, empty when the model returned none
    pub audio_base64: String,
}

/// Client for spoken chat completions and transcription
#[derive(Clone)]
pub struct SpeechClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    transcribe_model: String,
}

impl SpeechClient {
    /// Create a client from speech configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("OpenAI API key required for speech chat".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            transcribe_model: config.transcribe_model.clone(),
        })
    }

    /// Ask the model to answer `text` with both text and audio
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API answers with a
    /// non-success status
    pub async fn chat_and_speak(
        &self,
        text: &str,
        system_prompt: &str,
        voice: &str,
    ) -> Result<SpokenReply> {
        let request = ChatCompletionRequest {
            model: &self.chat_model,
            modalities: ["text", "audio"],
            audio: AudioOutput { voice, format: "mp3" },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text.trim(),
                },
            ],
        };

        tracing::debug!(model = %self.chat_model, voice, "requesting spoken reply");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            return Err(Error::Audio(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response.json().await?;
        let reply = result.into_reply();

        if reply.audio_base64.is_empty() {
            tracing::warn!("reply carried no audio");
        }
        tracing::info!(
            reply_chars = reply.text.chars().count(),
            audio_bytes = reply.audio_base64.len(),
            "spoken reply complete"
        );

        Ok(reply)
    }

    /// Transcribe base64-encoded WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns error if the audio is not valid base64, the request fails, or
    /// the API answers with a non-success status
    pub async fn transcribe(&self, audio_base64: &str) -> Result<String> {
        let audio = base64::engine::general_purpose::STANDARD.decode(audio_base64.trim())?;
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Transcribe(e.to_string()))?,
            )
            .text("model", self.transcribe_model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Transcribe(format!("API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    modalities: [&'static str; 2],
    audio: AudioOutput<'a>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct AudioOutput<'a> {
    voice: &'a str,
    format: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    fn into_reply(self) -> SpokenReply {
        let Some(message) = self.choices.into_iter().next().map(|c| c.message) else {
            return SpokenReply::default();
        };

        match message.audio {
            Some(audio) => SpokenReply {
                text: audio
                    .transcript
                    .or(message.content)
                    .unwrap_or_default(),
                audio_base64: audio.data,
            },
            None => SpokenReply {
                text: message.content.unwrap_or_default(),
                audio_base64: String::new(),
            },
        }
    }
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    audio: Option<ResponseAudio>,
}

#[derive(Deserialize)]
struct ResponseAudio {
    #[serde(default)]
    data: String,
    #[serde(default)]
    transcript: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}
