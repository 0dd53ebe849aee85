use super::*;
use time::macros::datetime;

const ALL_LABELS: [&str; 8] = [
    "1:00 PM - 1:30 PM",
    "1:30 PM - 2:00 PM",
    "2:00 PM - 2:30 PM",
    "2:30 PM - 3:00 PM",
    "8:00 PM - 8:30 PM",
    "8:30 PM - 9:00 PM",
    "9:00 PM - 9:30 PM",
    "9:30 PM - 10:00 PM",
];

// =============================================================================
// SessionFilter::parse / rpc_session
// =============================================================================

#[test]
fn parse_blank_and_all_mean_no_filter() {
    assert_eq!(SessionFilter::parse(None), SessionFilter::All);
    assert_eq!(SessionFilter::parse(Some("")), SessionFilter::All);
    assert_eq!(SessionFilter::parse(Some("  ")), SessionFilter::All);
    assert_eq!(SessionFilter::parse(Some("all")), SessionFilter::All);
}

#[test]
fn parse_band_keys() {
    assert_eq!(SessionFilter::parse(Some("1pm-3pm")), SessionFilter::Afternoon);
    assert_eq!(SessionFilter::parse(Some("8pm-10pm")), SessionFilter::Evening);
}

#[test]
fn grouped_bands_send_null_session() {
    assert_eq!(SessionFilter::All.rpc_session(), None);
    assert_eq!(SessionFilter::Afternoon.rpc_session(), None);
    assert_eq!(SessionFilter::Evening.rpc_session(), None);
}

#[test]
fn exact_label_is_passed_through() {
    let filter = SessionFilter::parse(Some("8:30 PM - 9:00 PM"));
    assert_eq!(filter.rpc_session(), Some("8:30 PM - 9:00 PM"));
}

// =============================================================================
// band filtering
// =============================================================================

#[test]
fn afternoon_band_selects_exactly_four_afternoon_labels() {
    let selected: Vec<&str> = ALL_LABELS
        .iter()
        .copied()
        .filter(|l| SessionFilter::Afternoon.matches(l))
        .collect();
    assert_eq!(selected, vec!["1:00 PM - 1:30 PM", "1:30 PM - 2:00 PM", "2:00 PM - 2:30 PM", "2:30 PM - 3:00 PM"]);
}

#[test]
fn evening_band_selects_exactly_four_evening_labels() {
    let selected: Vec<&str> = ALL_LABELS
        .iter()
        .copied()
        .filter(|l| SessionFilter::Evening.matches(l))
        .collect();
    assert_eq!(selected, vec!["8:00 PM - 8:30 PM", "8:30 PM - 9:00 PM", "9:00 PM - 9:30 PM", "9:30 PM - 10:00 PM"]);
}

#[test]
fn bands_reject_unknown_and_empty_labels() {
    assert!(!SessionFilter::Afternoon.matches(""));
    assert!(!SessionFilter::Afternoon.matches("3:00 PM - 3:30 PM"));
    assert!(!SessionFilter::Evening.matches("1:00 PM - 1:30 PM"));
}

#[test]
fn retain_drops_rows_outside_band_and_rows_without_session() {
    let mut rows = vec![Some("1:00 PM - 1:30 PM"), Some("8:00 PM - 8:30 PM"), None, Some("2:30 PM - 3:00 PM")];
    SessionFilter::Afternoon.retain(&mut rows, |r| *r);
    assert_eq!(rows, vec![Some("1:00 PM - 1:30 PM"), Some("2:30 PM - 3:00 PM")]);
}

#[test]
fn retain_is_noop_for_all_and_exact() {
    let mut rows = vec![Some("x"), None];
    SessionFilter::All.retain(&mut rows, |r| *r);
    SessionFilter::Exact("x".into()).retain(&mut rows, |r| *r);
    assert_eq!(rows.len(), 2);
}

#[test]
fn session_table_lists_both_bands() {
    let bands = session_bands();
    assert_eq!(bands[0].name, "Afternoon");
    assert_eq!(bands[0].sessions.len(), 4);
    assert_eq!(bands[1].key, "8pm-10pm");
}

// =============================================================================
// has_completed
// =============================================================================

#[test]
fn completed_exactly_at_session_end() {
    let date = Some("2025-11-20");
    let session = Some("1:00 PM - 1:30 PM");
    assert!(!has_completed(date, session, datetime!(2025-11-20 13:29:59)));
    assert!(has_completed(date, session, datetime!(2025-11-20 13:30:00)));
    assert!(has_completed(date, session, datetime!(2025-11-21 09:00:00)));
}

#[test]
fn not_completed_on_previous_day() {
    assert!(!has_completed(Some("2025-11-20"), Some("1:00 PM - 1:30 PM"), datetime!(2025-11-19 23:59:00)));
}

#[test]
fn evening_end_uses_pm_hours() {
    let date = Some("2025-12-01");
    let session = Some("9:30 PM - 10:00 PM");
    assert!(!has_completed(date, session, datetime!(2025-12-01 21:59:00)));
    assert!(has_completed(date, session, datetime!(2025-12-01 22:00:00)));
}

#[test]
fn twelve_am_is_midnight() {
    assert!(has_completed(Some("2025-12-01"), Some("11:30 PM - 12:00 AM"), datetime!(2025-12-01 00:00:00)));
}

#[test]
fn lowercase_meridiem_is_accepted() {
    assert!(has_completed(Some("2025-12-01"), Some("1:00 pm - 1:30 pm"), datetime!(2025-12-01 13:30:00)));
}

#[test]
fn unparseable_end_falls_back_to_date_before_today() {
    let now = datetime!(2025-12-02 08:00:00);
    assert!(has_completed(Some("2025-12-01"), Some("Afternoon"), now));
    assert!(!has_completed(Some("2025-12-02"), Some("Afternoon"), now));
}

#[test]
fn missing_or_invalid_inputs_are_not_completed() {
    let now = datetime!(2030-01-01 00:00:00);
    assert!(!has_completed(None, Some("1:00 PM - 1:30 PM"), now));
    assert!(!has_completed(Some("2025-12-01"), None, now));
    assert!(!has_completed(Some(""), Some("1:00 PM - 1:30 PM"), now));
    assert!(!has_completed(Some("not-a-date"), Some("1:00 PM - 1:30 PM"), now));
}

#[test]
fn parse_date_accepts_timestamp_prefix() {
    assert_eq!(parse_date("2025-11-20T10:00:00Z"), parse_date("2025-11-20"));
    assert!(parse_date("2025-02-30").is_none());
}
