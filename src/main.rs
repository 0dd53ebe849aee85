use std::net::SocketAddr;
use std::sync::Arc;

use seva_portal::backend::supabase::SupabaseClient;
use seva_portal::config::PortalConfig;
use seva_portal::llm::gemini::GeminiFromEnv;
use seva_portal::routes;
use seva_portal::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = PortalConfig::from_env().expect("invalid configuration");
    let backend = SupabaseClient::new(&config.backend).expect("backend client init failed");
    // The Gemini key is read per request, so a missing key only fails chat.
    let llm = GeminiFromEnv::new().expect("LLM client init failed");

    let port = config.port;
    let state = AppState::new(config, Arc::new(backend), Arc::new(llm));
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "seva portal listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed");
}
