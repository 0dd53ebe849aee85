//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the public endpoints (health, session table, chat
//! proxy, pass lookup) and the admin API. Admin handlers take an
//! [`auth::AdminUser`] extractor, so authorization happens before any
//! backend procedure runs.

pub mod admin;
pub mod auth;
pub mod chat;
pub mod pass;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::slots::{SessionBand, session_bands};
use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/annadanam/sessions", get(sessions))
        .route("/api/chat", post(chat::chat))
        .route("/api/pass", get(pass::show))
        .route("/api/pass/attend", post(pass::attend))
        .route("/api/admin/annadanam", get(admin::annadanam))
        .route("/api/admin/pooja", get(admin::pooja))
        .route("/api/admin/volunteers", get(admin::volunteers))
        .route("/api/admin/donations", get(admin::donations))
        .route("/api/admin/contact", get(admin::contact))
        .route("/api/admin/blocked", get(admin::blocked))
        .route("/api/admin/blocked/check", post(admin::block_check))
        .route("/api/admin/blocked/{user_id}/unblock", post(admin::unblock))
        .route("/api/admin/export", get(admin::bulk_export))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `GET /api/annadanam/sessions`
async fn sessions() -> Json<[SessionBand; 2]> {
    Json(session_bands())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
