//! Session extractors.
//!
//! The access token comes from `Authorization: Bearer <jwt>` or, for
//! browser requests, the `sb-access-token` cookie set by the auth client.
//! The admin allowlist is consulted on every request.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::debug;

use crate::backend::Procedures;
use crate::error::ApiError;
use crate::models::SessionUser;
use crate::services::auth::{self as auth_svc, AuthError};
use crate::state::AppState;

pub(crate) const ACCESS_COOKIE: &str = "sb-access-token";

/// Bearer token, falling back to the session cookie.
pub(crate) fn access_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(ACCESS_COOKIE)
        .map(Cookie::value)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub(crate) fn auth_error(err: AuthError) -> ApiError {
    match err {
        AuthError::Unauthenticated => ApiError::unauthorized(),
        AuthError::Forbidden => ApiError::forbidden(),
        AuthError::Backend(_) => ApiError::from_code(StatusCode::BAD_GATEWAY, &err),
    }
}

// =============================================================================
// EXTRACTORS
// =============================================================================

/// Any signed-in user.
pub struct SessionAuth {
    pub user: SessionUser,
    pub token: String,
}

impl<S> FromRequestParts<S> for SessionAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = access_token(parts).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        let user = auth_svc::resolve_session(app_state.backend.as_ref(), &token)
            .await
            .map_err(auth_error)?;
        Ok(Self { user, token })
    }
}

/// A signed-in user whose email is on the admin allowlist.
pub struct AdminUser {
    pub user: SessionUser,
    pub token: String,
}

impl AdminUser {
    /// Procedure calls made with the admin's own token.
    pub fn procedures<'a>(&'a self, state: &'a AppState) -> Procedures<'a> {
        Procedures::new(state.backend.as_ref(), Some(&self.token))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = access_token(parts).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        let allowlist = app_state.admins.current();
        let user = auth_svc::require_admin(app_state.backend.as_ref(), &allowlist, &token)
            .await
            .map_err(auth_error)?;
        Ok(Self { user, token })
    }
}

/// Session if one resolves; never rejects.
pub struct MaybeSession(pub Option<SessionAuth>);

impl<S> FromRequestParts<S> for MaybeSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match SessionAuth::from_request_parts(parts, state).await {
            Ok(session) => Ok(Self(Some(session))),
            Err(e) => {
                debug!(code = e.body.code, "auth: continuing without session");
                Ok(Self(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use axum::http::header::COOKIE;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let p = parts(
            Request::builder()
                .header(AUTHORIZATION, "Bearer abc")
                .header(COOKIE, "sb-access-token=def"),
        );
        assert_eq!(access_token(&p).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_fallback() {
        let p = parts(Request::builder().header(COOKIE, "other=1; sb-access-token=def"));
        assert_eq!(access_token(&p).as_deref(), Some("def"));
    }

    #[test]
    fn missing_or_blank_token_is_none() {
        assert!(access_token(&parts(Request::builder())).is_none());
        assert!(access_token(&parts(Request::builder().header(AUTHORIZATION, "Bearer   "))).is_none());
        assert!(access_token(&parts(Request::builder().header(AUTHORIZATION, "Basic abc"))).is_none());
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(auth_error(AuthError::Unauthenticated).status, StatusCode::UNAUTHORIZED);
        assert_eq!(auth_error(AuthError::Forbidden).status, StatusCode::FORBIDDEN);
    }
}
