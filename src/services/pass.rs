//! Annadanam pass lookup and attendance confirmation.
//!
//! The QR code carries an opaque token. Looking it up is public; marking
//! attendance is an admin action. Raw tokens are never logged.

use serde::Serialize;
use time::PrimitiveDateTime;
use tracing::{info, warn};

use crate::backend::{Procedures, RpcError, token_fingerprint};
use crate::models::AnnadanamBooking;
use crate::slots::has_completed;

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Missing QR token")]
    MissingToken,
    #[error("Invalid or expired pass")]
    InvalidPass,
    #[error("{0}")]
    Backend(#[from] RpcError),
}

impl crate::error::ErrorCode for PassError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "E_MISSING_TOKEN",
            Self::InvalidPass => "E_INVALID_PASS",
            Self::Backend(_) => "E_PASS_BACKEND",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Backend(e) if crate::error::ErrorCode::retryable(e))
    }
}

/// Pick the token from `t`, falling back to `token`. Both are trimmed.
///
/// # Errors
///
/// Returns [`PassError::MissingToken`] when neither carries a value.
pub fn pass_token(t: Option<&str>, token: Option<&str>) -> Result<String, PassError> {
    [t, token]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(PassError::MissingToken)
}

#[derive(Debug, Clone, Serialize)]
pub struct PassView {
    pub booking: AnnadanamBooking,
    pub completed: bool,
    pub is_admin: bool,
}

/// Look up the booking behind a pass token.
///
/// # Errors
///
/// [`PassError::InvalidPass`] when no booking matches,
/// [`PassError::Backend`] when the lookup fails.
pub async fn lookup(procs: &Procedures<'_>, token: &str) -> Result<AnnadanamBooking, PassError> {
    let fingerprint = token_fingerprint(token);
    match procs.lookup_annadanam_pass(token).await {
        Ok(Some(booking)) => {
            info!(token = %fingerprint, "pass: lookup");
            Ok(booking)
        }
        Ok(None) => {
            warn!(token = %fingerprint, "pass: no booking for token");
            Err(PassError::InvalidPass)
        }
        Err(e) => {
            warn!(token = %fingerprint, error = %e, "pass: lookup failed");
            Err(e.into())
        }
    }
}

/// Public view of a pass.
///
/// # Errors
///
/// As [`lookup`].
pub async fn view(
    procs: &Procedures<'_>,
    token: &str,
    is_admin: bool,
    now: PrimitiveDateTime,
) -> Result<PassView, PassError> {
    let booking = lookup(procs, token).await?;
    let completed = has_completed(booking.date.as_deref(), booking.session.as_deref(), now);
    Ok(PassView { booking, completed, is_admin })
}

/// Mark a pass attended. When the backend returns no row, the current
/// booking is returned unchanged.
///
/// # Errors
///
/// [`PassError::Backend`] when marking fails, or as [`lookup`] for the
/// fallback read.
pub async fn confirm_attendance(procs: &Procedures<'_>, token: &str) -> Result<AnnadanamBooking, PassError> {
    let fingerprint = token_fingerprint(token);
    match procs.mark_annadanam_attended(token).await? {
        Some(updated) => {
            info!(token = %fingerprint, "pass: attendance confirmed");
            Ok(updated)
        }
        None => {
            warn!(token = %fingerprint, "pass: attendance returned no row");
            lookup(procs, token).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn token_prefers_t_then_token() {
        assert_eq!(pass_token(Some(" abc "), Some("def")).unwrap(), "abc");
        assert_eq!(pass_token(Some(""), Some("def")).unwrap(), "def");
        assert_eq!(pass_token(None, Some("def")).unwrap(), "def");
        assert!(matches!(pass_token(None, None), Err(PassError::MissingToken)));
        assert!(matches!(pass_token(Some(" "), Some("")), Err(PassError::MissingToken)));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_pass() {
        let mock = MockBackend::new().reply("lookup_annadanam_pass", json!([]));
        let procs = Procedures::new(&mock, None);
        let err = lookup(&procs, "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired pass");
    }

    #[tokio::test]
    async fn backend_message_is_surfaced() {
        let mock = MockBackend::new().fail("lookup_annadanam_pass", 400, "token malformed");
        let procs = Procedures::new(&mock, None);
        let err = lookup(&procs, "x").await.unwrap_err();
        assert_eq!(err.to_string(), "token malformed");
    }

    #[tokio::test]
    async fn view_reports_completion_and_admin() {
        let mock = MockBackend::new().reply(
            "lookup_annadanam_pass",
            json!({ "date": "2025-11-20", "session": "1:00 PM - 1:30 PM", "name": "Ravi", "qty": 2 }),
        );
        let procs = Procedures::new(&mock, None);
        let view = view(&procs, "tok", true, datetime!(2025-11-20 14:00)).await.unwrap();
        assert!(view.completed);
        assert!(view.is_admin);
        assert_eq!(view.booking.qty, Some(2));
    }

    #[tokio::test]
    async fn attendance_returns_updated_row() {
        let mock = MockBackend::new().reply(
            "mark_annadanam_attended",
            json!([{ "status": "attended", "attended_at": "2025-11-20T08:00:00Z" }]),
        );
        let procs = Procedures::new(&mock, Some("admin-jwt"));
        let booking = confirm_attendance(&procs, "tok").await.unwrap();
        assert_eq!(booking.status.as_deref(), Some("attended"));
        assert_eq!(mock.calls()[0].params, json!({ "token": "tok" }));
        assert_eq!(mock.calls()[0].access_token.as_deref(), Some("admin-jwt"));
    }

    #[tokio::test]
    async fn attendance_without_row_falls_back_to_lookup() {
        let mock = MockBackend::new()
            .reply("mark_annadanam_attended", json!(null))
            .reply("lookup_annadanam_pass", json!({ "status": "booked" }));
        let procs = Procedures::new(&mock, Some("admin-jwt"));
        let booking = confirm_attendance(&procs, "tok").await.unwrap();
        assert_eq!(booking.status.as_deref(), Some("booked"));
        assert_eq!(mock.calls_to("lookup_annadanam_pass").len(), 1);
    }
}
