//! Admin listings and the no-show blocking workflow.
//!
//! DESIGN
//! ======
//! Each listing is one backend call with a fixed row cap. Filters the
//! backend doesn't understand (grouped session bands) are applied locally
//! after the fetch. The blocking policy itself (two consecutive misses, a
//! seven-day block, enforced from 2025-11-15) lives in the backend; this
//! module only triggers the check, partitions the list, and unblocks.
//!
//! A failed call never yields rows: the error replaces the listing.

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{BookingRange, Procedures, RpcError, TimestampRange};
use crate::export::{Column, TableExport, csv, dated_stem, range_stem};
use crate::models::{BlockedUser, NewlyBlocked, Row, text};
use crate::slots::{SessionFilter, has_completed, parse_date};

/// Row cap for the interactive listings.
pub const LISTING_LIMIT: u32 = 500;

pub const NO_RESULTS: &str = "No results";

pub const BLOCKING_POLICY: &str = "Users who miss 2 consecutive bookings are automatically blocked for 7 days \
(enforced from Nov 15, 2025). Admins can unblock users at any time.";

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("Failed to load {what}: {source}")]
    Listing { what: &'static str, source: RpcError },
    #[error("Auto-block check failed: {0}")]
    BlockCheck(RpcError),
    #[error("Unable to identify admin user")]
    UnknownAdmin,
    #[error("User not found or already unblocked")]
    NotBlocked,
    #[error("Unblock failed: {0}")]
    Unblock(RpcError),
}

impl crate::error::ErrorCode for AdminError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidDate(_) => "E_INVALID_DATE",
            Self::Listing { .. } => "E_LISTING_FAILED",
            Self::BlockCheck(_) => "E_BLOCK_CHECK_FAILED",
            Self::UnknownAdmin => "E_UNKNOWN_ADMIN",
            Self::NotBlocked => "E_NOT_BLOCKED",
            Self::Unblock(_) => "E_UNBLOCK_FAILED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Listing { source, .. } => crate::error::ErrorCode::retryable(source),
            Self::BlockCheck(e) | Self::Unblock(e) => crate::error::ErrorCode::retryable(e),
            _ => false,
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Parse an optional `YYYY-MM-DD` query value. Blank means "no bound".
///
/// # Errors
///
/// Returns [`AdminError::InvalidDate`] when the value isn't a calendar date.
pub fn parse_date_param(raw: Option<&str>) -> Result<Option<Date>, AdminError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) if raw.len() == 10 => parse_date(raw)
            .map(Some)
            .ok_or_else(|| AdminError::InvalidDate(raw.to_string())),
        Some(raw) => Err(AdminError::InvalidDate(raw.to_string())),
    }
}

/// Inclusive range of local calendar days. `None` bounds are open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

impl DateRange {
    /// A single day (or everything when `None`).
    #[must_use]
    pub fn day(date: Option<Date>) -> Self {
        Self { start: date, end: date }
    }

    pub(crate) fn booking_params(&self, session: &SessionFilter, limit: u32) -> BookingRange {
        BookingRange {
            start_date: self.start.map(|d| d.to_string()),
            end_date: self.end.map(|d| d.to_string()),
            sess: session.rpc_session().map(str::to_string),
            limit_rows: limit,
            offset_rows: 0,
        }
    }

    /// Timestamps covering whole local days: from midnight of `start` up to
    /// midnight after `end`.
    pub(crate) fn timestamp_params(&self, offset: UtcOffset, limit: u32) -> TimestampRange {
        TimestampRange {
            start_ts: self.start.and_then(|d| local_midnight(d, offset)),
            end_ts: self
                .end
                .and_then(|d| d.next_day())
                .and_then(|d| local_midnight(d, offset)),
            limit_rows: limit,
            offset_rows: 0,
        }
    }

    #[must_use]
    pub fn start_label(&self) -> Option<String> {
        self.start.map(|d| d.to_string())
    }

    #[must_use]
    pub fn end_label(&self) -> Option<String> {
        self.end.map(|d| d.to_string())
    }
}

fn local_midnight(date: Date, offset: UtcOffset) -> Option<String> {
    date.midnight().assume_offset(offset).format(&Rfc3339).ok()
}

// =============================================================================
// LISTINGS
// =============================================================================

/// JSON view of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Listing<T> {
    pub count: usize,
    pub notice: Option<&'static str>,
    pub rows: Vec<T>,
}

impl<T> Listing<T> {
    #[must_use]
    pub fn new(rows: Vec<T>) -> Self {
        let notice = rows.is_empty().then_some(NO_RESULTS);
        Self { count: rows.len(), notice, rows }
    }
}

/// Annadanam booking row plus whether its session has already ended.
#[derive(Debug, Clone, Serialize)]
pub struct AnnadanamRow {
    #[serde(flatten)]
    pub booking: Row,
    pub completed: bool,
}

/// Annadanam bookings for one day (or all days), filtered by session.
///
/// # Errors
///
/// Returns [`AdminError::Listing`] when the backend call fails.
pub async fn list_annadanam(
    procs: &Procedures<'_>,
    date: Option<Date>,
    session: &SessionFilter,
) -> Result<Vec<Row>, AdminError> {
    let params = DateRange::day(date).booking_params(session, LISTING_LIMIT);
    let mut rows = procs
        .admin_list_annadanam_bookings(&params)
        .await
        .map_err(|source| listing_failed("Annadanam bookings", source))?;
    session.retain(&mut rows, |row| text(row, "session"));
    info!(count = rows.len(), "admin: annadanam listing");
    Ok(rows)
}

/// Attach the `completed` flag as of `now` (local wall clock).
#[must_use]
pub fn mark_completed(rows: Vec<Row>, now: PrimitiveDateTime) -> Vec<AnnadanamRow> {
    rows.into_iter()
        .map(|booking| {
            let completed = has_completed(text(&booking, "date"), text(&booking, "session"), now);
            AnnadanamRow { booking, completed }
        })
        .collect()
}

/// # Errors
///
/// Returns [`AdminError::Listing`] when the backend call fails.
pub async fn list_pooja(procs: &Procedures<'_>, range: &DateRange, session: &SessionFilter) -> Result<Vec<Row>, AdminError> {
    let mut rows = procs
        .admin_list_pooja_bookings(&range.booking_params(session, LISTING_LIMIT))
        .await
        .map_err(|source| listing_failed("pooja bookings", source))?;
    session.retain(&mut rows, |row| text(row, "session"));
    Ok(rows)
}

/// # Errors
///
/// Returns [`AdminError::Listing`] when the backend call fails.
pub async fn list_volunteers(
    procs: &Procedures<'_>,
    range: &DateRange,
    session: &SessionFilter,
) -> Result<Vec<Row>, AdminError> {
    let mut rows = procs
        .admin_list_volunteer_bookings(&range.booking_params(session, LISTING_LIMIT))
        .await
        .map_err(|source| listing_failed("volunteer bookings", source))?;
    session.retain(&mut rows, |row| text(row, "session"));
    Ok(rows)
}

/// # Errors
///
/// Returns [`AdminError::Listing`] when the backend call fails.
pub async fn list_donations(
    procs: &Procedures<'_>,
    range: &DateRange,
    offset: UtcOffset,
) -> Result<Vec<Row>, AdminError> {
    procs
        .admin_list_donations(&range.timestamp_params(offset, LISTING_LIMIT))
        .await
        .map_err(|source| listing_failed("donations", source))
}

/// # Errors
///
/// Returns [`AdminError::Listing`] when the backend call fails.
pub async fn list_contact(
    procs: &Procedures<'_>,
    range: &DateRange,
    offset: UtcOffset,
) -> Result<Vec<Row>, AdminError> {
    procs
        .admin_list_contact_us(&range.timestamp_params(offset, LISTING_LIMIT))
        .await
        .map_err(|source| listing_failed("contact messages", source))
}

fn listing_failed(what: &'static str, source: RpcError) -> AdminError {
    warn!(what, error = %source, "admin: listing failed");
    AdminError::Listing { what, source }
}

// =============================================================================
// EXPORT SPECS
// =============================================================================

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| (*k).to_string()).collect()
}

#[must_use]
pub fn annadanam_export(date: Option<&str>) -> TableExport<'_> {
    TableExport {
        stem: dated_stem("annadanam-bookings", date),
        title: "Annadanam Bookings",
        subtitle: date,
        csv_keys: keys(&["date", "session", "name", "email", "phone", "qty", "status", "user_id", "created_at"]),
        pdf_columns: vec![
            Column::left("date", "Date", 90.0),
            Column::center("session", "Session", 120.0),
            Column::left("name", "Name", 180.0),
            Column::left("email", "Email", 220.0),
            Column::left("phone", "Phone", 120.0),
        ],
    }
}

#[must_use]
pub fn donations_export(start: Option<&str>, end: Option<&str>) -> TableExport<'static> {
    TableExport {
        stem: range_stem("donations", start, end),
        title: "Donations",
        subtitle: None,
        csv_keys: keys(&["created_at", "name", "email", "phone", "amount", "address", "status"]),
        pdf_columns: vec![
            Column::left("created_at", "Created", 130.0),
            Column::left("name", "Name", 170.0),
            Column::left("email", "Email", 200.0),
            Column::left("phone", "Phone", 110.0),
            Column::right("amount", "Amount", 90.0),
            Column::left("status", "Status", 90.0),
        ],
    }
}

#[must_use]
pub fn contact_export(start: Option<&str>, end: Option<&str>) -> TableExport<'static> {
    TableExport {
        stem: range_stem("contact-messages", start, end),
        title: "Contact Messages",
        subtitle: None,
        csv_keys: keys(&["created_at", "first_name", "last_name", "email", "phone", "subject", "message", "status"]),
        pdf_columns: vec![
            Column::left("created_at", "Created", 130.0),
            Column::left("first_name", "First Name", 120.0),
            Column::left("last_name", "Last Name", 120.0),
            Column::left("email", "Email", 220.0),
            Column::left("phone", "Phone", 120.0),
            Column::left("subject", "Subject", 160.0),
            Column::left("status", "Status", 100.0),
        ],
    }
}

/// Export spec for opaque rows (pooja, volunteers): columns follow the
/// first row's keys.
#[must_use]
pub fn opaque_export<'a>(base: &str, title: &'a str, rows: &[Row], start: Option<&str>, end: Option<&str>) -> TableExport<'a> {
    let keys = csv::keys_of_first(rows);
    TableExport {
        stem: range_stem(base, start, end),
        title,
        subtitle: None,
        pdf_columns: Column::from_keys(&keys),
        csv_keys: keys,
    }
}

/// Render `created_at` as local `YYYY-MM-DD HH:MM` for the donations PDF.
/// Unparseable values fall back to their first 19 chars with `T` as a space.
#[must_use]
pub fn local_timestamp(raw: &str, offset: UtcOffset) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .and_then(|ts| ts.to_offset(offset).format(&format).ok())
        .unwrap_or_else(|| raw.chars().take(19).collect::<String>().replace('T', " "))
}

/// Rows for the donations PDF, with `created_at` localized.
#[must_use]
pub fn donation_pdf_rows(rows: &[Row], offset: UtcOffset) -> Vec<Row> {
    rows.iter()
        .map(|donation| {
            let pretty = local_timestamp(text(donation, "created_at").unwrap_or(""), offset);
            let mut row = donation.clone();
            row.insert("created_at".into(), pretty.into());
            row
        })
        .collect()
}

// =============================================================================
// BLOCKING
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BlockedOverview {
    pub active: Vec<BlockedUser>,
    pub unblocked: Vec<BlockedUser>,
    pub policy: &'static str,
}

/// List blocked users, partitioned into active and unblocked.
///
/// # Errors
///
/// Returns [`AdminError::Listing`] ("Failed to load blocked users ...").
pub async fn blocked_overview(procs: &Procedures<'_>) -> Result<BlockedOverview, AdminError> {
    let users = procs
        .list_blocked_users()
        .await
        .map_err(|source| listing_failed("blocked users", source))?;
    let (active, rest): (Vec<_>, Vec<_>) = users.into_iter().partition(BlockedUser::is_active);
    let unblocked = rest
        .into_iter()
        .filter(|u| u.status == crate::models::BlockStatus::Unblocked)
        .collect();
    Ok(BlockedOverview { active, unblocked, policy: BLOCKING_POLICY })
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockCheckOutcome {
    pub newly_blocked: Vec<NewlyBlocked>,
    pub message: String,
}

/// Run the backend's no-show check now.
///
/// # Errors
///
/// Returns [`AdminError::BlockCheck`] when the backend call fails.
pub async fn run_block_check(procs: &Procedures<'_>) -> Result<BlockCheckOutcome, AdminError> {
    let newly_blocked = procs
        .check_and_block_no_show_users()
        .await
        .map_err(AdminError::BlockCheck)?;
    let message = if newly_blocked.is_empty() {
        "No users met the criteria for blocking.".to_string()
    } else {
        format!("{} user(s) have been blocked for consecutive no-shows.", newly_blocked.len())
    };
    info!(count = newly_blocked.len(), "admin: auto-block check");
    Ok(BlockCheckOutcome { newly_blocked, message })
}

#[derive(Debug, Clone, Serialize)]
pub struct UnblockOutcome {
    pub user_id: Uuid,
    pub notes: String,
    pub message: &'static str,
}

/// Audit note stored with a manual unblock.
#[must_use]
pub fn unblock_note(at: OffsetDateTime) -> String {
    let stamp = at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("Manually unblocked by admin on {stamp}")
}

/// Lift a block on behalf of `admin_id`.
///
/// # Errors
///
/// [`AdminError::UnknownAdmin`] without an admin id, [`AdminError::NotBlocked`]
/// when the backend reports nothing to unblock, [`AdminError::Unblock`] when
/// the call fails.
pub async fn unblock(
    procs: &Procedures<'_>,
    user_id: Uuid,
    admin_id: Option<Uuid>,
    at: OffsetDateTime,
) -> Result<UnblockOutcome, AdminError> {
    let admin_id = admin_id.ok_or(AdminError::UnknownAdmin)?;
    let notes = unblock_note(at);
    let unblocked = procs
        .unblock_user(user_id, admin_id, &notes)
        .await
        .map_err(AdminError::Unblock)?;
    if !unblocked {
        return Err(AdminError::NotBlocked);
    }
    info!(%user_id, %admin_id, "admin: user unblocked");
    Ok(UnblockOutcome { user_id, notes, message: "User unblocked" })
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
