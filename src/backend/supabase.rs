//! Supabase (PostgREST + GoTrue) transport.
//!
//! Thin HTTP wrapper around three endpoints:
//! - `POST /rest/v1/rpc/{procedure}` for stored procedures
//! - `GET /rest/v1/{table}?select=*&limit=N` for plain table reads
//! - `GET /auth/v1/user` to resolve an access token
//!
//! Every request carries the project's anon key as `apikey`. The bearer is
//! the caller's access token when present, otherwise the anon key, so the
//! backend's row-level security sees the real caller. Pure parsing lives in
//! `parse_body` and `error_message` for testability.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::debug;

use super::{BackendRpc, RpcError};
use crate::config::BackendConfig;
use crate::models::SessionUser;

const MAX_ERROR_BODY_CHARS: usize = 300;

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns [`RpcError::HttpClientBuild`] if the HTTP client can't be built.
    pub fn new(config: &BackendConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| RpcError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn bearer(&self, access_token: Option<&str>) -> String {
        format!("Bearer {}", access_token.unwrap_or(&self.anon_key))
    }

    async fn finish(&self, response: reqwest::Response) -> Result<Value, RpcError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RpcError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(RpcError::Response { status, message: error_message(status, &text) });
        }
        parse_body(&text)
    }
}

#[async_trait::async_trait]
impl BackendRpc for SupabaseClient {
    async fn rpc(&self, procedure: &str, params: Value, access_token: Option<&str>) -> Result<Value, RpcError> {
        debug!(procedure, "backend: rpc");
        let response = self
            .http
            .post(rpc_url(&self.base_url, procedure))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, self.bearer(access_token))
            .json(&params)
            .send()
            .await
            .map_err(|e| RpcError::Request(e.to_string()))?;
        self.finish(response).await
    }

    async fn select(&self, table: &str, limit: usize, access_token: Option<&str>) -> Result<Value, RpcError> {
        debug!(table, limit, "backend: select");
        let response = self
            .http
            .get(format!("{}/rest/v1/{table}", self.base_url))
            .query(&[("select", "*".to_string()), ("limit", limit.to_string())])
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, self.bearer(access_token))
            .send()
            .await
            .map_err(|e| RpcError::Request(e.to_string()))?;
        self.finish(response).await
    }

    async fn session_user(&self, access_token: &str) -> Result<Option<SessionUser>, RpcError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| RpcError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if matches!(status, 401 | 403) {
            return Ok(None);
        }
        let value = self.finish(response).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| RpcError::Parse(e.to_string()))
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn rpc_url(base_url: &str, procedure: &str) -> String {
    format!("{base_url}/rest/v1/rpc/{procedure}")
}

/// Empty bodies (void procedures, 204) decode as `null`.
fn parse_body(text: &str) -> Result<Value, RpcError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| RpcError::Parse(e.to_string()))
}

/// Human-readable message from a PostgREST / GoTrue error body.
fn error_message(status: u16, text: &str) -> String {
    if let Ok(Value::Object(body)) = serde_json::from_str::<Value>(text) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(Value::String(message)) = body.get(key)
                && !message.is_empty()
            {
                return message.clone();
            }
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return format!("backend returned status {status}");
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
