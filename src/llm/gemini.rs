//! Gemini `streamGenerateContent` client.
//!
//! Thin HTTP wrapper: posts the request with `alt=sse` and hands the body
//! stream to [`super::sse::fragments`]. No retry.

use std::time::Duration;

use futures::StreamExt;
use tracing::{info, warn};

use super::config::{GeminiConfig, LlmTimeouts};
use super::sse;
use super::types::{FragmentStream, GenerateRequest, LlmError, LlmStream};

/// Upstream error bodies are cut to this many characters.
pub const ERROR_BODY_CHARS: usize = 100;

pub(crate) fn build_http(timeouts: LlmTimeouts) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| LlmError::HttpClientBuild(e.to_string()))
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        let http = build_http(config.timeouts)?;
        Ok(Self { http, config })
    }

    fn with_http(http: reqwest::Client, config: GeminiConfig) -> Self {
        Self { http, config }
    }

    /// Start a streamed generation.
    ///
    /// # Errors
    ///
    /// [`LlmError::ApiRequest`] when the call fails to send,
    /// [`LlmError::ApiResponse`] on a non-success status.
    pub async fn stream(&self, request: &GenerateRequest) -> Result<FragmentStream, LlmError> {
        let response = self
            .http
            .post(self.config.stream_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), model = %self.config.model, "gemini: upstream rejected request");
            return Err(LlmError::ApiResponse { status: status.as_u16(), body: truncate_chars(&text, ERROR_BODY_CHARS) });
        }

        info!(model = %self.config.model, turns = request.contents.len(), "gemini: stream opened");
        Ok(sse::fragments(response.bytes_stream()).boxed())
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[async_trait::async_trait]
impl LlmStream for GeminiClient {
    fn check_configured(&self) -> Result<(), LlmError> {
        if self.config.api_key.is_empty() { Err(LlmError::MissingApiKey) } else { Ok(()) }
    }

    async fn stream_generate(&self, request: GenerateRequest) -> Result<FragmentStream, LlmError> {
        self.stream(&request).await
    }
}

// =============================================================================
// PER-REQUEST CONFIG
// =============================================================================

/// Reads [`GeminiConfig`] from the environment on every call, so a key set
/// or rotated after startup takes effect immediately. The HTTP client is
/// shared.
pub struct GeminiFromEnv {
    http: reqwest::Client,
}

impl GeminiFromEnv {
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new() -> Result<Self, LlmError> {
        Ok(Self { http: build_http(LlmTimeouts::from_env())? })
    }
}

#[async_trait::async_trait]
impl LlmStream for GeminiFromEnv {
    fn check_configured(&self) -> Result<(), LlmError> {
        GeminiConfig::from_env().map(|_| ())
    }

    async fn stream_generate(&self, request: GenerateRequest) -> Result<FragmentStream, LlmError> {
        let config = GeminiConfig::from_env()?;
        GeminiClient::with_http(self.http.clone(), config).stream(&request).await
    }
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
