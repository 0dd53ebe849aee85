use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use serde_json::json;

use super::*;
use crate::backend::mock::MockBackend;
use crate::llm::mock::MockLlm;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::routes::app;
use crate::routes::tests::{Reply, router, send};
use crate::state::test_helpers::test_app_state;

fn chat_request(body: &str, client: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn post_chat(llm: MockLlm, body: &str) -> Reply {
    let (router, _) = router(MockBackend::new(), llm);
    send(router, chat_request(body, "10.0.0.1")).await
}

#[tokio::test]
async fn relays_fragments_as_sse_events() {
    let reply = post_chat(MockLlm::replying(&["Swamiye ", "", "Saranam"]), r#"{"message":"hi","history":[]}"#).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header("content-type"), "text/event-stream");
    assert_eq!(reply.header("cache-control"), "no-cache");
    assert_eq!(reply.text(), "data: {\"text\":\"Swamiye \"}\n\ndata: {\"text\":\"Saranam\"}\n\n");
}

#[tokio::test]
async fn stream_error_sends_a_terminal_error_event() {
    let llm = MockLlm::scripted(vec![Ok("partial".into()), Err("connection reset".into()), Ok("lost".into())]);
    let failed = post_chat(llm, r#"{"message":"hi"}"#).await;
    assert_eq!(failed.status, StatusCode::OK);
    assert_eq!(
        failed.text(),
        "data: {\"text\":\"partial\"}\n\nevent: error\ndata: {\"error\":\"Failed to get response from AI\"}\n\n"
    );

    let finished = post_chat(MockLlm::replying(&["partial"]), r#"{"message":"hi"}"#).await;
    assert_ne!(failed.body, finished.body);
    assert!(!finished.text().contains("event: error"));
}

#[tokio::test]
async fn missing_key_is_a_server_error() {
    let reply = post_chat(MockLlm::unconfigured(), r#"{"message":"hi"}"#).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json()["error"], "Gemini API key not configured");
}

#[tokio::test]
async fn missing_or_unreadable_message_is_bad_request() {
    for body in [r#"{"history":[]}"#, r#"{"message":"   "}"#, "not json"] {
        let reply = post_chat(MockLlm::replying(&["x"]), body).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(reply.json()["error"], "Message is required");
    }
}

#[tokio::test]
async fn upstream_status_passes_through() {
    let reply = post_chat(MockLlm::rejecting(503, "overloaded"), r#"{"message":"hi"}"#).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.json()["error"], "Failed to get response from AI: overloaded");
    assert_eq!(reply.json()["retryable"], true);
}

#[tokio::test]
async fn history_reaches_the_model() {
    let llm = Arc::new(MockLlm::replying(&["ok"]));
    let state = test_app_state(Arc::new(MockBackend::new()), llm.clone());
    let body = json!({
        "message": "and the evening slots?",
        "history": [
            { "role": "user", "content": "annadanam timings" },
            { "role": "assistant", "content": "1 PM to 3 PM" }
        ]
    });
    send(app(state), chat_request(&body.to_string(), "10.0.0.1")).await;

    let sent = &llm.requests()[0];
    assert_eq!(sent.contents.len(), 5);
    assert_eq!(sent.contents[3].role, crate::llm::Role::Model);
    assert_eq!(sent.contents[4].parts[0].text, "and the evening slots?");
}

#[tokio::test]
async fn per_client_limit_returns_429() {
    let mut state = test_app_state(Arc::new(MockBackend::new()), Arc::new(MockLlm::replying(&["ok"])));
    state.rate_limiter = RateLimiter::with_config(RateLimitConfig { per_client_limit: 1, ..RateLimitConfig::default() });
    let router = app(state);

    let first = send(router.clone(), chat_request(r#"{"message":"hi"}"#, "10.0.0.7")).await;
    assert_eq!(first.status, StatusCode::OK);
    let second = send(router.clone(), chat_request(r#"{"message":"hi"}"#, "10.0.0.7")).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.json()["code"], "E_RATE_LIMIT_CLIENT");

    let other = send(router, chat_request(r#"{"message":"hi"}"#, "10.0.0.8, 172.16.0.1")).await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn direct_peers_get_separate_buckets() {
    let mut state = test_app_state(Arc::new(MockBackend::new()), Arc::new(MockLlm::replying(&["ok"])));
    state.rate_limiter = RateLimiter::with_config(RateLimitConfig { per_client_limit: 1, ..RateLimitConfig::default() });
    let router = app(state);

    let from_peer = |ip: [u8; 4], port: u16| {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"message":"hi"}"#))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, port))));
        request
    };

    assert_eq!(send(router.clone(), from_peer([192, 0, 2, 1], 50_000)).await.status, StatusCode::OK);
    assert_eq!(send(router.clone(), from_peer([192, 0, 2, 2], 50_001)).await.status, StatusCode::OK);
    let again = send(router, from_peer([192, 0, 2, 1], 50_002)).await;
    assert_eq!(again.status, StatusCode::TOO_MANY_REQUESTS);
}

#[test]
fn client_key_prefers_forwarded_then_peer() {
    let peer = Some(SocketAddr::from(([203, 0, 113, 9], 4242)));
    let mut headers = HeaderMap::new();
    assert_eq!(client_key(&headers, None), "direct");
    assert_eq!(client_key(&headers, peer), "203.0.113.9");
    headers.insert("x-real-ip", "192.0.2.5".parse().unwrap());
    assert_eq!(client_key(&headers, peer), "192.0.2.5");
    headers.insert("x-forwarded-for", " 198.51.100.1 , 10.0.0.1".parse().unwrap());
    assert_eq!(client_key(&headers, peer), "198.51.100.1");
}
