//! Chat assistant: request validation and Gemini prompt assembly.
//!
//! The prompt is always: organization context (as a user turn), the fixed
//! greeting (as a model turn), the most recent history, then the new
//! message. The key check runs before validation so an unconfigured
//! deployment answers every request the same way.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{Content, FragmentStream, GenerateRequest, LlmError, LlmStream, Role};

/// Organization context sent ahead of every conversation.
pub const SYSTEM_CONTEXT: &str = include_str!("chat_context.txt");

/// Opening assistant turn, shown first in every transcript.
/// Payload of the terminal `error` event sent when the reply stream breaks
/// after the first fragment.
pub const STREAM_FAILED: &str = "Failed to get response from AI";

pub const GREETING: &str = "Swamiye Saranam Ayyappa! I am here to help you with Sabarimala Yatra information, Annadanam booking, Pooja booking, and information about Sabari Sastha Seva Samithi. How may I assist you today?";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Gemini API key not configured")]
    MissingKey,
    #[error("Message is required")]
    EmptyMessage,
    #[error("Failed to get response from AI: {detail}")]
    Upstream { status: u16, detail: String },
    #[error("{0}")]
    Llm(LlmError),
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey => Self::MissingKey,
            LlmError::ApiResponse { status, body } => Self::Upstream { status, detail: body },
            other => Self::Llm(other),
        }
    }
}

impl crate::error::ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingKey => "E_MISSING_API_KEY",
            Self::EmptyMessage => "E_MESSAGE_REQUIRED",
            Self::Upstream { .. } => "E_UPSTREAM",
            Self::Llm(e) => crate::error::ErrorCode::error_code(e),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Llm(e) => crate::error::ErrorCode::retryable(e),
            Self::MissingKey | Self::EmptyMessage => false,
        }
    }
}

/// One prior turn as the browser sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

/// Raw `POST /api/chat` body. Fields stay untyped so a wrong type gets the
/// same answer as a missing field.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub history: Value,
}

impl ChatRequest {
    #[must_use]
    pub fn new(message: &str, history: &[HistoryTurn]) -> Self {
        Self {
            message: Value::String(message.to_string()),
            history: serde_json::to_value(history).unwrap_or(Value::Null),
        }
    }
}

/// The message must be a string with visible content.
///
/// # Errors
///
/// [`ChatError::EmptyMessage`] otherwise.
pub fn validate_message(message: &Value) -> Result<&str, ChatError> {
    match message.as_str() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ChatError::EmptyMessage),
    }
}

/// History turns with a string `content`; anything else is skipped.
#[must_use]
pub fn parse_history(history: &Value) -> Vec<HistoryTurn> {
    let Some(items) = history.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let content = item.get("content")?.as_str()?;
            let role = item.get("role").and_then(Value::as_str).unwrap_or_default();
            Some(HistoryTurn { role: role.to_string(), content: content.to_string() })
        })
        .collect()
}

/// Full Gemini contents for `message`, keeping the last `limit` turns.
#[must_use]
pub fn build_contents(history: &[HistoryTurn], message: &str, limit: usize) -> Vec<Content> {
    let recent = &history[history.len().saturating_sub(limit)..];
    let mut contents = Vec::with_capacity(recent.len() + 3);
    contents.push(Content::text(Role::User, SYSTEM_CONTEXT));
    contents.push(Content::text(Role::Model, GREETING));
    contents.extend(
        recent
            .iter()
            .map(|turn| Content::text(Role::from_label(&turn.role), turn.content.as_str())),
    );
    contents.push(Content::text(Role::User, message));
    contents
}

/// Validate, assemble, and open the upstream stream.
///
/// # Errors
///
/// See [`ChatError`]; the key check precedes message validation.
pub async fn start_chat(
    llm: &dyn LlmStream,
    request: &ChatRequest,
    history_limit: usize,
) -> Result<FragmentStream, ChatError> {
    llm.check_configured()?;
    let message = validate_message(&request.message)?;
    let history = parse_history(&request.history);
    let contents = build_contents(&history, message, history_limit);

    let stream = llm
        .stream_generate(GenerateRequest::new(contents))
        .await
        .map_err(|e| {
            warn!(error = %e, "chat: upstream failed");
            ChatError::from(e)
        })?;
    info!(history = history.len().min(history_limit), "chat: streaming reply");
    Ok(stream)
}
