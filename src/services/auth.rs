//! Session resolution and the admin allowlist.
//!
//! DESIGN
//! ======
//! Identity belongs to the backend: an access token is resolved through the
//! backend's auth endpoint, never decoded locally. Admin rights are a plain
//! email allowlist read from `ADMIN_EMAILS` (falling back to `ADMIN_EMAIL`)
//! at request time. An empty allowlist grants nobody admin access.

use tracing::{debug, warn};

use crate::backend::{BackendRpc, RpcError, token_fingerprint};
use crate::models::SessionUser;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Admin access required")]
    Forbidden,
    #[error("session lookup failed: {0}")]
    Backend(#[from] RpcError),
}

impl crate::error::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "E_UNAUTHORIZED",
            Self::Forbidden => "E_FORBIDDEN",
            Self::Backend(_) => "E_AUTH_BACKEND",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Backend(e) if crate::error::ErrorCode::retryable(e))
    }
}

// =============================================================================
// ALLOWLIST
// =============================================================================

/// Lower-cased admin emails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowlist {
    emails: Vec<String>,
}

impl AdminAllowlist {
    /// Split on commas, semicolons and whitespace; case-insensitive.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let emails = raw
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { emails }
    }

    /// Read `ADMIN_EMAILS`, falling back to `ADMIN_EMAIL` when unset or blank.
    #[must_use]
    pub fn from_env() -> Self {
        let raw = std::env::var("ADMIN_EMAILS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| std::env::var("ADMIN_EMAIL").ok())
            .unwrap_or_default();
        Self::parse(&raw)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    #[must_use]
    pub fn is_admin(&self, email: Option<&str>) -> bool {
        let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
            return false;
        };
        let email = email.to_lowercase();
        self.emails.iter().any(|allowed| *allowed == email)
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Resolve an access token to its user. Blank tokens are rejected without a
/// backend call.
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] when the backend rejects the token,
/// [`AuthError::Backend`] when the auth endpoint fails.
pub async fn resolve_session(backend: &dyn BackendRpc, access_token: &str) -> Result<SessionUser, AuthError> {
    if access_token.trim().is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    match backend.session_user(access_token).await? {
        Some(user) => {
            debug!(user_id = %user.id, "auth: session resolved");
            Ok(user)
        }
        None => {
            warn!(token = %token_fingerprint(access_token), "auth: token rejected");
            Err(AuthError::Unauthenticated)
        }
    }
}

/// Resolve a session and require its email to be allowlisted.
///
/// # Errors
///
/// As [`resolve_session`], plus [`AuthError::Forbidden`] for non-admins.
pub async fn require_admin(
    backend: &dyn BackendRpc,
    allowlist: &AdminAllowlist,
    access_token: &str,
) -> Result<SessionUser, AuthError> {
    let user = resolve_session(backend, access_token).await?;
    if allowlist.is_admin(user.email.as_deref()) {
        Ok(user)
    } else {
        warn!(user_id = %user.id, "auth: admin access denied");
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
