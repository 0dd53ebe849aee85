use super::*;
use crate::backend::mock::MockBackend;
use uuid::Uuid;

fn user(email: Option<&str>) -> SessionUser {
    SessionUser { id: Uuid::from_bytes([7; 16]), email: email.map(str::to_string) }
}

// =============================================================================
// AdminAllowlist
// =============================================================================

#[test]
fn parse_splits_on_commas_semicolons_and_whitespace() {
    let list = AdminAllowlist::parse(" a@x.org, B@X.org;c@x.org\n d@x.org ,, ");
    assert!(list.is_admin(Some("a@x.org")));
    assert!(list.is_admin(Some("b@x.org")));
    assert!(list.is_admin(Some("c@x.org")));
    assert!(list.is_admin(Some("d@x.org")));
    assert!(!list.is_admin(Some("e@x.org")));
}

#[test]
fn matching_is_case_insensitive() {
    let list = AdminAllowlist::parse("admin@seva.org");
    assert!(list.is_admin(Some("Admin@Seva.ORG")));
}

#[test]
fn empty_allowlist_admits_nobody() {
    let list = AdminAllowlist::parse("  ,; ");
    assert!(list.is_empty());
    assert!(!list.is_admin(Some("anyone@x.org")));
}

#[test]
fn missing_email_is_never_admin() {
    let list = AdminAllowlist::parse("a@x.org");
    assert!(!list.is_admin(None));
    assert!(!list.is_admin(Some("  ")));
}

// Single test for env-driven behavior so nothing races on shared vars.
#[test]
fn from_env_prefers_plural_then_falls_back() {
    unsafe {
        std::env::set_var("ADMIN_EMAILS", "one@x.org two@x.org");
        std::env::set_var("ADMIN_EMAIL", "solo@x.org");
    }
    let list = AdminAllowlist::from_env();
    assert!(list.is_admin(Some("two@x.org")));
    assert!(!list.is_admin(Some("solo@x.org")));

    unsafe {
        std::env::set_var("ADMIN_EMAILS", "  ");
    }
    assert!(AdminAllowlist::from_env().is_admin(Some("solo@x.org")));

    unsafe {
        std::env::remove_var("ADMIN_EMAILS");
        std::env::remove_var("ADMIN_EMAIL");
    }
    assert!(AdminAllowlist::from_env().is_empty());
}

// =============================================================================
// sessions
// =============================================================================

#[tokio::test]
async fn blank_token_is_unauthenticated_without_backend_call() {
    let mock = MockBackend::new();
    let err = resolve_session(&mock, " ").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}

#[tokio::test]
async fn unknown_token_is_unauthenticated() {
    let mock = MockBackend::new();
    let err = resolve_session(&mock, "nope").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}

#[tokio::test]
async fn admin_requires_allowlisted_email() {
    let mock = MockBackend::new()
        .user("admin-jwt", user(Some("admin@seva.org")))
        .user("devotee-jwt", user(Some("devotee@seva.org")));
    let list = AdminAllowlist::parse("admin@seva.org");

    let admin = require_admin(&mock, &list, "admin-jwt").await.unwrap();
    assert_eq!(admin.email.as_deref(), Some("admin@seva.org"));

    let err = require_admin(&mock, &list, "devotee-jwt").await.unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));
}
