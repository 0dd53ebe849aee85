//! Annadanam pass routes (QR code landing page data).

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::auth::{AdminUser, MaybeSession};
use crate::backend::Procedures;
use crate::error::ApiError;
use crate::models::AnnadanamBooking;
use crate::services::pass::{self as pass_svc, PassError, PassView};
use crate::slots::local_now;
use crate::state::AppState;

pub(crate) fn pass_error(err: PassError) -> ApiError {
    let status = match err {
        PassError::MissingToken => StatusCode::BAD_REQUEST,
        PassError::InvalidPass => StatusCode::NOT_FOUND,
        PassError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError::from_code(status, &err)
}

/// QR links carry `t`; older links carry `token`.
#[derive(Debug, Default, Deserialize)]
pub struct PassQuery {
    t: Option<String>,
    token: Option<String>,
}

impl PassQuery {
    fn token(&self) -> Result<String, ApiError> {
        pass_svc::pass_token(self.t.as_deref(), self.token.as_deref()).map_err(pass_error)
    }
}

/// `GET /api/pass`
pub async fn show(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Query(query): Query<PassQuery>,
) -> Result<Json<PassView>, ApiError> {
    let token = query.token()?;
    let is_admin = session
        .as_ref()
        .is_some_and(|s| state.admins.current().is_admin(s.user.email.as_deref()));
    let procs = Procedures::new(state.backend.as_ref(), session.as_ref().map(|s| s.token.as_str()));
    let view = pass_svc::view(&procs, &token, is_admin, local_now(state.config.local_offset))
        .await
        .map_err(pass_error)?;
    Ok(Json(view))
}

/// `POST /api/pass/attend`
pub async fn attend(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<PassQuery>,
) -> Result<Json<AnnadanamBooking>, ApiError> {
    let token = query.token()?;
    let booking = pass_svc::confirm_attendance(&admin.procedures(&state), &token)
        .await
        .map_err(pass_error)?;
    Ok(Json(booking))
}
