//! LLM types: Gemini request shapes, errors, and the streaming trait.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// `GEMINI_API_KEY` is unset or blank.
    #[error("Gemini API key not configured")]
    MissingApiKey,

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The response stream broke after it started.
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::Stream(_) => "E_API_STREAM",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::Stream(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// CONTENTS
// =============================================================================

/// Speaker of a turn, as Gemini names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// `"user"` stays the user; any other role is the model.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label == "user" { Self::User } else { Self::Model }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    #[must_use]
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self { role, parts: vec![Part { text: text.into() }] }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.7, top_k: 40, top_p: 0.95, max_output_tokens: 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Block medium-and-above for every harm category.
#[must_use]
pub fn default_safety_settings() -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting { category, threshold: "BLOCK_MEDIUM_AND_ABOVE" })
        .collect()
}

/// Body of a `streamGenerateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerateRequest {
    #[must_use]
    pub fn new(contents: Vec<Content>) -> Self {
        Self { contents, generation_config: GenerationConfig::default(), safety_settings: default_safety_settings() }
    }
}

// =============================================================================
// STREAMING TRAIT
// =============================================================================

/// Text fragments in arrival order. An `Err` item ends the stream.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// Streaming text generation. Enables mocking in tests.
#[async_trait::async_trait]
pub trait LlmStream: Send + Sync {
    /// Fail fast when the provider has no credentials.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] when unconfigured.
    fn check_configured(&self) -> Result<(), LlmError>;

    /// Start a generation and return its fragment stream.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails or the provider answers
    /// with a non-success status.
    async fn stream_generate(&self, request: GenerateRequest) -> Result<FragmentStream, LlmError>;
}
