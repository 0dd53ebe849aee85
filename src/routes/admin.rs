//! Admin routes: listings with optional file export, blocking, bulk export.
//!
//! Every listing shares one shape: without `format` it answers a JSON
//! [`Listing`]; with `format` it answers the same rows as an attachment.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use super::auth::AdminUser;
use crate::error::ApiError;
use crate::export::{ExportError, ExportFile, ExportFormat};
use crate::models::Row;
use crate::services::admin::{self as admin_svc, AdminError, DateRange, Listing};
use crate::services::export as export_svc;
use crate::slots::{SessionFilter, local_now};
use crate::state::AppState;

pub(crate) fn admin_error(err: AdminError) -> ApiError {
    let status = match err {
        AdminError::InvalidDate(_) => StatusCode::BAD_REQUEST,
        AdminError::UnknownAdmin => StatusCode::UNAUTHORIZED,
        AdminError::NotBlocked => StatusCode::NOT_FOUND,
        AdminError::Listing { .. } | AdminError::BlockCheck(_) | AdminError::Unblock(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError::from_code(status, &err)
}

pub(crate) fn export_error(err: ExportError) -> ApiError {
    let status = match err {
        ExportError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
        ExportError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::from_code(status, &err)
}

/// Send an export as a download.
pub(crate) fn attachment(file: ExportFile) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    (
        [(CONTENT_TYPE, file.content_type.to_string()), (CONTENT_DISPOSITION, disposition)],
        file.bytes,
    )
        .into_response()
}

// =============================================================================
// LISTINGS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    date: Option<String>,
    session: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
    session: Option<String>,
    format: Option<String>,
}

impl RangeQuery {
    fn range(&self) -> Result<DateRange, ApiError> {
        Ok(DateRange {
            start: admin_svc::parse_date_param(self.start.as_deref()).map_err(admin_error)?,
            end: admin_svc::parse_date_param(self.end.as_deref()).map_err(admin_error)?,
        })
    }

    fn format(&self) -> Result<Option<ExportFormat>, ApiError> {
        ExportFormat::parse(self.format.as_deref()).map_err(export_error)
    }
}

/// `GET /api/admin/annadanam`
pub async fn annadanam(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<DayQuery>,
) -> Result<Response, ApiError> {
    let date = admin_svc::parse_date_param(query.date.as_deref()).map_err(admin_error)?;
    let format = ExportFormat::parse(query.format.as_deref()).map_err(export_error)?;
    let session = SessionFilter::parse(query.session.as_deref());

    let procs = admin.procedures(&state);
    let rows = admin_svc::list_annadanam(&procs, date, &session)
        .await
        .map_err(admin_error)?;

    let Some(format) = format else {
        let now = local_now(state.config.local_offset);
        return Ok(Json(Listing::new(admin_svc::mark_completed(rows, now))).into_response());
    };
    let label = date.map(|d| d.to_string());
    let file = admin_svc::annadanam_export(label.as_deref())
        .render(format, &rows)
        .map_err(export_error)?;
    Ok(attachment(file))
}

/// `GET /api/admin/pooja`
pub async fn pooja(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let (range, format) = (query.range()?, query.format()?);
    let session = SessionFilter::parse(query.session.as_deref());
    let rows = admin_svc::list_pooja(&admin.procedures(&state), &range, &session)
        .await
        .map_err(admin_error)?;
    opaque_response("pooja-bookings", "Pooja Bookings", rows, &range, format)
}

/// `GET /api/admin/volunteers`
pub async fn volunteers(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let (range, format) = (query.range()?, query.format()?);
    let session = SessionFilter::parse(query.session.as_deref());
    let rows = admin_svc::list_volunteers(&admin.procedures(&state), &range, &session)
        .await
        .map_err(admin_error)?;
    opaque_response("volunteer-bookings", "Volunteer Bookings", rows, &range, format)
}

fn opaque_response(
    base: &str,
    title: &str,
    rows: Vec<Row>,
    range: &DateRange,
    format: Option<ExportFormat>,
) -> Result<Response, ApiError> {
    let Some(format) = format else {
        return Ok(Json(Listing::new(rows)).into_response());
    };
    let (start, end) = (range.start_label(), range.end_label());
    let file = admin_svc::opaque_export(base, title, &rows, start.as_deref(), end.as_deref())
        .render(format, &rows)
        .map_err(export_error)?;
    Ok(attachment(file))
}

/// `GET /api/admin/donations`
pub async fn donations(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let (range, format) = (query.range()?, query.format()?);
    let offset = state.config.local_offset;
    let rows = admin_svc::list_donations(&admin.procedures(&state), &range, offset)
        .await
        .map_err(admin_error)?;

    let Some(format) = format else {
        return Ok(Json(Listing::new(rows)).into_response());
    };
    let table = match format {
        ExportFormat::Pdf => admin_svc::donation_pdf_rows(&rows, offset),
        ExportFormat::Json | ExportFormat::Csv => rows,
    };
    let (start, end) = (range.start_label(), range.end_label());
    let file = admin_svc::donations_export(start.as_deref(), end.as_deref())
        .render(format, &table)
        .map_err(export_error)?;
    Ok(attachment(file))
}

/// `GET /api/admin/contact`
pub async fn contact(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let (range, format) = (query.range()?, query.format()?);
    let rows = admin_svc::list_contact(&admin.procedures(&state), &range, state.config.local_offset)
        .await
        .map_err(admin_error)?;

    let Some(format) = format else {
        return Ok(Json(Listing::new(rows)).into_response());
    };
    let (start, end) = (range.start_label(), range.end_label());
    let file = admin_svc::contact_export(start.as_deref(), end.as_deref())
        .render(format, &rows)
        .map_err(export_error)?;
    Ok(attachment(file))
}

// =============================================================================
// BLOCKING
// =============================================================================

/// `GET /api/admin/blocked`
pub async fn blocked(State(state): State<AppState>, admin: AdminUser) -> Result<Response, ApiError> {
    let overview = admin_svc::blocked_overview(&admin.procedures(&state))
        .await
        .map_err(admin_error)?;
    Ok(Json(overview).into_response())
}

/// `POST /api/admin/blocked/check`
pub async fn block_check(State(state): State<AppState>, admin: AdminUser) -> Result<Response, ApiError> {
    let outcome = admin_svc::run_block_check(&admin.procedures(&state))
        .await
        .map_err(admin_error)?;
    Ok(Json(outcome).into_response())
}

/// `POST /api/admin/blocked/{user_id}/unblock`
pub async fn unblock(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let outcome = admin_svc::unblock(
        &admin.procedures(&state),
        user_id,
        Some(admin.user.id),
        OffsetDateTime::now_utc(),
    )
    .await
    .map_err(admin_error)?;
    Ok(Json(outcome).into_response())
}

// =============================================================================
// BULK EXPORT
// =============================================================================

/// `GET /api/admin/export`
pub async fn bulk_export(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let range = query.range()?;
    let format = query.format()?.unwrap_or(ExportFormat::Json);
    let offset = state.config.local_offset;

    let bundle = export_svc::bulk_export(&admin.procedures(&state), &range, offset).await;
    let now = OffsetDateTime::now_utc();
    let generated_at = now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string());
    let (start, end) = (range.start_label(), range.end_label());
    let file = bundle
        .render(format, local_now(offset).date(), &generated_at, start.as_deref(), end.as_deref())
        .map_err(export_error)?;
    Ok(attachment(file))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
