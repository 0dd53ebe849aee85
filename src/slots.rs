//! Annadanam session labels, band filtering, and completion marking.
//!
//! DESIGN
//! ======
//! Sessions are fixed half-hour labels such as `"1:00 PM - 1:30 PM"`. Admin
//! listings accept either a single label (passed through to the backend as
//! `sess`) or one of two grouped bands. Grouped bands fetch every session and
//! filter locally, since the backend only knows individual labels.

use serde::Serialize;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Afternoon half-hour labels, 1:00 PM to 3:00 PM.
pub const AFTERNOON_SESSIONS: [&str; 4] =
    ["1:00 PM - 1:30 PM", "1:30 PM - 2:00 PM", "2:00 PM - 2:30 PM", "2:30 PM - 3:00 PM"];

/// Evening half-hour labels, 8:00 PM to 10:00 PM.
pub const EVENING_SESSIONS: [&str; 4] =
    ["8:00 PM - 8:30 PM", "8:30 PM - 9:00 PM", "9:00 PM - 9:30 PM", "9:30 PM - 10:00 PM"];

pub const AFTERNOON_BAND_KEY: &str = "1pm-3pm";
pub const EVENING_BAND_KEY: &str = "8pm-10pm";

// =============================================================================
// FILTER
// =============================================================================

/// Session filter selected on the admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFilter {
    All,
    Afternoon,
    Evening,
    Exact(String),
}

impl SessionFilter {
    /// Parse the `session` query value. Blank and `all` mean no filter.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::All;
        };
        match raw {
            "all" => Self::All,
            AFTERNOON_BAND_KEY => Self::Afternoon,
            EVENING_BAND_KEY => Self::Evening,
            label => Self::Exact(label.to_string()),
        }
    }

    /// Value for the backend's nullable `sess` parameter.
    #[must_use]
    pub fn rpc_session(&self) -> Option<&str> {
        match self {
            Self::Exact(label) => Some(label),
            Self::All | Self::Afternoon | Self::Evening => None,
        }
    }

    /// Whether a row with this session label survives local filtering.
    ///
    /// `Exact` is already filtered by the backend, so it accepts everything.
    #[must_use]
    pub fn matches(&self, session: &str) -> bool {
        match self {
            Self::All | Self::Exact(_) => true,
            Self::Afternoon => AFTERNOON_SESSIONS.contains(&session),
            Self::Evening => EVENING_SESSIONS.contains(&session),
        }
    }

    /// Keep only rows whose session label matches.
    pub fn retain<T>(&self, rows: &mut Vec<T>, session_of: impl Fn(&T) -> Option<&str>) {
        if matches!(self, Self::All | Self::Exact(_)) {
            return;
        }
        rows.retain(|row| self.matches(session_of(row).unwrap_or("")));
    }
}

// =============================================================================
// SESSION TABLE
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SessionBand {
    pub key: &'static str,
    pub name: &'static str,
    pub window: &'static str,
    pub sessions: &'static [&'static str],
}

/// The public session table shown on the Annadanam page.
#[must_use]
pub fn session_bands() -> [SessionBand; 2] {
    [
        SessionBand {
            key: AFTERNOON_BAND_KEY,
            name: "Afternoon",
            window: "1:00 PM - 3:00 PM",
            sessions: &AFTERNOON_SESSIONS,
        },
        SessionBand { key: EVENING_BAND_KEY, name: "Evening", window: "8:00 PM - 10:00 PM", sessions: &EVENING_SESSIONS },
    ]
}

// =============================================================================
// COMPLETION
// =============================================================================

/// Current wall-clock time at the configured offset, without the offset.
#[must_use]
pub fn local_now(offset: UtcOffset) -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc().to_offset(offset);
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Parse a `YYYY-MM-DD` date, ignoring anything after the first 10 chars.
#[must_use]
pub fn parse_date(raw: &str) -> Option<Date> {
    let head = raw.trim().get(..10)?;
    let mut parts = head.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    let month = time::Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Parse `"H:MM AM"` / `"HH:MM pm"` into minutes after midnight.
///
/// Hour 12 is treated as 0 before the meridiem is applied, so `12:00 AM` is
/// midnight and `12:30 PM` is half past noon.
fn parse_clock(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (hh, rest) = raw.split_once(':')?;
    if hh.is_empty() || hh.len() > 2 || !hh.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mm = rest.get(..2)?;
    if !mm.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let meridiem = rest[2..].trim_start();
    let pm = if meridiem.eq_ignore_ascii_case("pm") {
        true
    } else if meridiem.eq_ignore_ascii_case("am") {
        false
    } else {
        return None;
    };
    let hour: i64 = hh.parse().ok()?;
    let minute: i64 = mm.parse().ok()?;
    let hour = hour % 12 + if pm { 12 } else { 0 };
    Some(hour * 60 + minute)
}

/// Whether a booking's session has already ended at `now` (local time).
///
/// The end time is the part of the label after `-`. When that part is not a
/// clock time the booking counts as completed once its date is before today.
#[must_use]
pub fn has_completed(date: Option<&str>, session: Option<&str>, now: PrimitiveDateTime) -> bool {
    let (Some(date), Some(session)) = (date.filter(|d| !d.is_empty()), session.filter(|s| !s.is_empty())) else {
        return false;
    };
    let Some(day) = parse_date(date) else {
        return false;
    };
    let end_part = session.split('-').nth(1).unwrap_or("").trim();
    match parse_clock(end_part) {
        Some(minutes) => now >= day.midnight() + Duration::minutes(minutes),
        None => day < now.date(),
    }
}

#[cfg(test)]
#[path = "slots_test.rs"]
mod tests;
