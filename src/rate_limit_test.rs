use super::*;

fn limiter(per_client: usize, global: usize) -> RateLimiter {
    RateLimiter::with_config(RateLimitConfig {
        per_client_limit: per_client,
        per_client_window: Duration::from_secs(60),
        global_limit: global,
        global_window: Duration::from_secs(60),
    })
}

#[test]
fn per_client_allows_up_to_limit() {
    let rl = limiter(3, 100);
    let now = Instant::now();

    for i in 0..3 {
        assert!(rl.check_and_record_at("10.0.0.1", now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("10.0.0.1", now),
        Err(RateLimitError::PerClientExceeded { limit: 3, window_secs: 60 })
    ));
}

#[test]
fn global_allows_up_to_limit() {
    let rl = limiter(100, 5);
    let now = Instant::now();

    for i in 0..5 {
        assert!(rl.check_and_record_at(&format!("client-{i}"), now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("client-new", now),
        Err(RateLimitError::GlobalExceeded { limit: 5, .. })
    ));
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = limiter(2, 100);
    let start = Instant::now();

    for _ in 0..2 {
        rl.check_and_record_at("a", start).unwrap();
    }
    assert!(rl.check_and_record_at("a", start).is_err());

    let after_window = start + Duration::from_secs(60) + Duration::from_millis(1);
    assert!(rl.check_and_record_at("a", after_window).is_ok());
}

#[test]
fn distinct_clients_do_not_interfere() {
    let rl = limiter(1, 100);
    let now = Instant::now();

    rl.check_and_record_at("a", now).unwrap();
    assert!(rl.check_and_record_at("a", now).is_err());
    assert!(rl.check_and_record_at("b", now).is_ok());
}

#[test]
fn rejected_request_is_not_recorded() {
    let rl = limiter(1, 2);
    let now = Instant::now();

    rl.check_and_record_at("a", now).unwrap();
    assert!(rl.check_and_record_at("a", now).is_err());
    // The rejected call above must not have consumed global capacity.
    assert!(rl.check_and_record_at("b", now).is_ok());
}

#[test]
fn idle_clients_are_evicted_when_map_is_full() {
    let rl = RateLimiter::with_config(RateLimitConfig {
        per_client_limit: 5,
        per_client_window: Duration::from_secs(1),
        global_limit: usize::MAX,
        global_window: Duration::from_secs(1),
    });
    let start = Instant::now();
    for i in 0..MAX_TRACKED_CLIENTS {
        rl.check_and_record_at(&i.to_string(), start).unwrap();
    }
    assert_eq!(rl.tracked_clients(), MAX_TRACKED_CLIENTS);

    let later = start + Duration::from_secs(5);
    rl.check_and_record_at("fresh", later).unwrap();
    assert_eq!(rl.tracked_clients(), 1);
}

#[test]
fn errors_are_retryable_with_codes() {
    use crate::error::ErrorCode;
    let err = RateLimitError::PerClientExceeded { limit: 10, window_secs: 60 };
    assert!(err.retryable());
    assert_eq!(err.error_code(), "E_RATE_LIMIT_CLIENT");
}
