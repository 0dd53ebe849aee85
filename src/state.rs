//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! The backend and the LLM sit behind trait objects so handlers run
//! unchanged against in-memory fakes in tests. The admin allowlist is read
//! per request in production (`AdminSource::Env`) and pinned in tests.

use std::sync::Arc;

use crate::backend::BackendRpc;
use crate::config::PortalConfig;
use crate::llm::LlmStream;
use crate::rate_limit::RateLimiter;
use crate::services::auth::AdminAllowlist;

/// Where admin emails come from.
#[derive(Clone)]
pub enum AdminSource {
    /// `ADMIN_EMAILS` / `ADMIN_EMAIL`, reread on every request.
    Env,
    Fixed(Arc<AdminAllowlist>),
}

impl AdminSource {
    #[must_use]
    pub fn current(&self) -> AdminAllowlist {
        match self {
            Self::Env => AdminAllowlist::from_env(),
            Self::Fixed(list) => list.as_ref().clone(),
        }
    }
}

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub backend: Arc<dyn BackendRpc>,
    pub llm: Arc<dyn LlmStream>,
    pub admins: AdminSource,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(config: PortalConfig, backend: Arc<dyn BackendRpc>, llm: Arc<dyn LlmStream>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            llm,
            admins: AdminSource::Env,
            rate_limiter: RateLimiter::new(),
        }
    }
}
