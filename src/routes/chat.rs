//! Streaming chat proxy.
//!
//! ARCHITECTURE
//! ============
//! `POST /api/chat` validates the request, opens the Gemini stream, and
//! relays each text fragment as one SSE event `data: {"text": "..."}`.
//! Errors before the first byte are JSON error bodies. An upstream failure
//! after streaming began sends one `event: error` whose data is
//! `{"error": "..."}` and then closes the stream, so clients can tell a
//! broken reply from a finished one.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::HeaderMap;
use axum::http::request::Parts;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use futures::future::ready;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::rate_limit::RateLimitError;
use crate::services::chat::{self as chat_svc, ChatError, ChatRequest};
use crate::state::AppState;

pub(crate) fn chat_error(err: ChatError) -> ApiError {
    let status = match &err {
        ChatError::MissingKey => StatusCode::INTERNAL_SERVER_ERROR,
        ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
        ChatError::Upstream { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
        ChatError::Llm(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError::from_code(status, &err)
}

fn rate_limit_error(err: RateLimitError) -> ApiError {
    ApiError::from_code(StatusCode::TOO_MANY_REQUESTS, &err)
}

/// Rate-limit key: the first forwarded address, then `X-Real-IP`, then the
/// peer's IP. Only a server started without connect info falls back to one
/// shared bucket.
pub(crate) fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match (forwarded, peer) {
        (Some(addr), _) => addr.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "direct".to_string(),
    }
}

/// Extracts the rate-limit key of the calling client.
pub struct ClientKey(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_key(&parts.headers, peer)))
    }
}

fn failure_event() -> Event {
    Event::default()
        .event("error")
        .data(json!({ "error": chat_svc::STREAM_FAILED }).to_string())
}

/// `POST /api/chat`
///
/// A body that isn't JSON is treated like an empty one, so it gets the
/// same "Message is required" answer.
pub async fn chat(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    state.rate_limiter.check_and_record(&client).map_err(rate_limit_error)?;

    let request = body.map(|Json(r)| r).unwrap_or_else(|rejection| {
        debug!(error = %rejection, "chat: unreadable body");
        ChatRequest::default()
    });
    let fragments = chat_svc::start_chat(state.llm.as_ref(), &request, state.config.chat_history_limit)
        .await
        .map_err(chat_error)?;

    let events = fragments
        .scan(false, |failed, item| {
            if *failed {
                return ready(None);
            }
            ready(Some(match item {
                Ok(text) => (!text.is_empty()).then(|| Event::default().data(json!({ "text": text }).to_string())),
                Err(e) => {
                    warn!(error = %e, "chat: stream failed mid-reply");
                    *failed = true;
                    Some(failure_event())
                }
            }))
        })
        .filter_map(ready)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).into_response())
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
