//! Backend: the remote procedure boundary.
//!
//! ARCHITECTURE
//! ============
//! All business logic (slot allocation, booking validation, no-show
//! blocking, pass issuance) runs inside the backend's stored procedures.
//! This module only names those procedures, shapes their parameters, and
//! decodes their rows.
//!
//! - [`BackendRpc`] is the transport seam (mocked in tests).
//! - [`supabase::SupabaseClient`] is the production transport.
//! - [`Procedures`] is the typed facade, bound to the caller's access token so
//!   row-level security applies to every call.

pub mod supabase;

#[cfg(test)]
pub(crate) mod mock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::models::{AnnadanamBooking, BlockedUser, NewlyBlocked, Row, SessionUser};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("backend request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Response { status: u16, message: String },

    /// The backend answered but the body was not the expected JSON.
    #[error("backend response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for RpcError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_BACKEND_REQUEST",
            Self::Response { .. } => "E_BACKEND_RESPONSE",
            Self::Parse(_) => "E_BACKEND_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 500..=599, .. })
    }
}

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// Transport to the backend-as-a-service. Enables mocking in tests.
#[async_trait::async_trait]
pub trait BackendRpc: Send + Sync {
    /// Invoke a named procedure with JSON parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the call fails or the backend reports an error.
    async fn rpc(&self, procedure: &str, params: Value, access_token: Option<&str>) -> Result<Value, RpcError>;

    /// Read up to `limit` rows of a table (subject to row-level security).
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the call fails or the backend reports an error.
    async fn select(&self, table: &str, limit: usize, access_token: Option<&str>) -> Result<Value, RpcError>;

    /// Resolve an access token to its user. `Ok(None)` when the token is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the auth endpoint can't be reached.
    async fn session_user(&self, access_token: &str) -> Result<Option<SessionUser>, RpcError>;
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Parameters shared by the booking listings (annadanam, pooja, volunteer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRange {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sess: Option<String>,
    pub limit_rows: u32,
    pub offset_rows: u32,
}

/// Parameters for timestamp-filtered listings (donations, contact messages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampRange {
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
    pub limit_rows: u32,
    pub offset_rows: u32,
}

#[derive(Serialize)]
struct UnblockParams<'a> {
    p_user_id: Uuid,
    p_admin_user_id: Uuid,
    p_notes: &'a str,
}

#[derive(Serialize)]
struct TokenParams<'a> {
    token: &'a str,
}

// =============================================================================
// PROCEDURES
// =============================================================================

/// Typed procedure calls bound to one caller's access token.
pub struct Procedures<'a> {
    rpc: &'a dyn BackendRpc,
    access_token: Option<&'a str>,
}

impl<'a> Procedures<'a> {
    #[must_use]
    pub fn new(rpc: &'a dyn BackendRpc, access_token: Option<&'a str>) -> Self {
        Self { rpc, access_token }
    }

    async fn call(&self, procedure: &str, params: Value) -> Result<Value, RpcError> {
        self.rpc.rpc(procedure, params, self.access_token).await
    }

    /// Every block record, active or lifted.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn list_blocked_users(&self) -> Result<Vec<BlockedUser>, RpcError> {
        let value = self.call("list_blocked_users", Value::Object(Row::new())).await?;
        Ok(rows_from("list_blocked_users", value))
    }

    /// Run the no-show check; returns the users it just blocked.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn check_and_block_no_show_users(&self) -> Result<Vec<NewlyBlocked>, RpcError> {
        let value = self
            .call("check_and_block_no_show_users", Value::Object(Row::new()))
            .await?;
        Ok(rows_from("check_and_block_no_show_users", value))
    }

    /// Returns `true` when the backend reports a truthy result.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn unblock_user(&self, user_id: Uuid, admin_user_id: Uuid, notes: &str) -> Result<bool, RpcError> {
        let params = to_params(&UnblockParams { p_user_id: user_id, p_admin_user_id: admin_user_id, p_notes: notes })?;
        let value = self.call("unblock_user", params).await?;
        Ok(is_truthy(&value))
    }

    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn admin_list_annadanam_bookings(&self, range: &BookingRange) -> Result<Vec<Row>, RpcError> {
        self.list("admin_list_annadanam_bookings", to_params(range)?).await
    }

    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn admin_list_pooja_bookings(&self, range: &BookingRange) -> Result<Vec<Row>, RpcError> {
        self.list("admin_list_pooja_bookings", to_params(range)?).await
    }

    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn admin_list_volunteer_bookings(&self, range: &BookingRange) -> Result<Vec<Row>, RpcError> {
        self.list("admin_list_volunteer_bookings", to_params(range)?).await
    }

    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn admin_list_donations(&self, range: &TimestampRange) -> Result<Vec<Row>, RpcError> {
        self.list("admin_list_donations", to_params(range)?).await
    }

    /// # Errors
    ///
    /// Returns [`RpcError`] when the procedure call fails.
    pub async fn admin_list_contact_us(&self, range: &TimestampRange) -> Result<Vec<Row>, RpcError> {
        self.list("admin_list_contact_us", to_params(range)?).await
    }

    /// Booking behind a pass token, `None` when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the call fails or the row can't be decoded.
    pub async fn lookup_annadanam_pass(&self, token: &str) -> Result<Option<AnnadanamBooking>, RpcError> {
        let value = self
            .call("lookup_annadanam_pass", to_params(&TokenParams { token })?)
            .await?;
        single_row("lookup_annadanam_pass", value)
    }

    /// Updated booking, or `None` when the backend returns no row.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the call fails or the row can't be decoded.
    pub async fn mark_annadanam_attended(&self, token: &str) -> Result<Option<AnnadanamBooking>, RpcError> {
        let value = self
            .call("mark_annadanam_attended", to_params(&TokenParams { token })?)
            .await?;
        single_row("mark_annadanam_attended", value)
    }

    /// Best-effort profile rows for the bulk export.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the table read fails.
    pub async fn profiles(&self, limit: usize) -> Result<Vec<Row>, RpcError> {
        let value = self.rpc.select("Profile-Table", limit, self.access_token).await?;
        Ok(rows_from("Profile-Table", value))
    }

    async fn list(&self, procedure: &str, params: Value) -> Result<Vec<Row>, RpcError> {
        let value = self.call(procedure, params).await?;
        Ok(rows_from(procedure, value))
    }
}

// =============================================================================
// DECODING HELPERS
// =============================================================================

fn to_params(params: &impl Serialize) -> Result<Value, RpcError> {
    serde_json::to_value(params).map_err(|e| RpcError::Parse(e.to_string()))
}

/// Decode a list result. Anything other than an array is an empty list.
/// Typed rows decode their fields leniently, so only items that aren't
/// JSON objects are skipped.
pub(crate) fn rows_from<T: DeserializeOwned>(procedure: &str, value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    let total = items.len();
    let rows: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if rows.len() < total {
        warn!(procedure, skipped = total - rows.len(), "backend: skipped malformed rows");
    }
    rows
}

/// Decode a single-row result: an array yields its first element.
pub(crate) fn single_row<T: DeserializeOwned>(procedure: &str, value: Value) -> Result<Option<T>, RpcError> {
    let value = match value {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| RpcError::Parse(format!("{procedure}: {e}")))
}

/// Truthiness of a JSON value, matching how callers treat procedure results.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Short SHA-256 fingerprint of a secret for log fields.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
