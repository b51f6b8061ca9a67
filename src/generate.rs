//! Client for the external text-generation service
//!
//! The service exposes `POST /generate` taking `{"prompt": ...}` and replies
//! with the generated text in a `response` field (some deployments use
//! `text` instead).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound for the reachability check, independent of the generate timeout
pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

/// Reply body from the generation service
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn into_reply(self) -> Option<String> {
        self.response.or(self.text)
    }
}

/// Forwards prompts to the generation service
#[derive(Clone)]
pub struct GenerateClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GenerateClient {
    /// Create a client for the service at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/generate", base_url.trim_end_matches('/')),
        })
    }

    /// Full URL of the generate endpoint
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `prompt` to the service and return its reply text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the service answers with a
    /// non-success status, or the body carries neither `response` nor `text`
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(prompt_chars = prompt.chars().count(), "forwarding prompt");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, endpoint = %self.endpoint, "generate request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "generation service error");
            return Err(Error::Generate(format!("service error {status}: {body}")));
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        let reply = result
            .into_reply()
            .ok_or_else(|| Error::Generate("reply has no 'response' or 'text' field".to_string()))?;

        tracing::info!(reply_chars = reply.chars().count(), "generation complete");
        Ok(reply)
    }

    /// Whether the service answers HTTP at all
    ///
    /// Any response, including an error status, counts as reachable. A
    /// service that accepts the connection but stays silent for
    /// [`REACHABILITY_TIMEOUT`] does not.
    pub async fn is_reachable(&self) -> bool {
        self.client
            .get(&self.endpoint)
            .timeout(REACHABILITY_TIMEOUT)
            .send()
            .await
            .is_ok()
    }
}
