//! Bulk export: every admin dataset for a date range, fetched concurrently.
//!
//! Each source degrades independently: a failed call becomes an empty
//! section and a warning, never a failed export.

use time::UtcOffset;
use tracing::{info, warn};

use super::admin::DateRange;
use crate::backend::{Procedures, RpcError};
use crate::export::bundle::ExportBundle;
use crate::slots::SessionFilter;

/// Row cap per source in a bulk export.
pub const BULK_LIMIT: u32 = 5000;

fn or_empty<T>(source: &'static str, result: Result<Vec<T>, RpcError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(source, error = %e, "export: source failed, exporting empty");
        Vec::new()
    })
}

/// Fetch all datasets for `range`.
pub async fn bulk_export(procs: &Procedures<'_>, range: &DateRange, offset: UtcOffset) -> ExportBundle {
    let booking = range.booking_params(&SessionFilter::All, BULK_LIMIT);
    let stamps = range.timestamp_params(offset, BULK_LIMIT);

    let (pooja, annadanam, donations, contact, volunteers) = futures::join!(
        procs.admin_list_pooja_bookings(&booking),
        procs.admin_list_annadanam_bookings(&booking),
        procs.admin_list_donations(&stamps),
        procs.admin_list_contact_us(&stamps),
        procs.admin_list_volunteer_bookings(&booking),
    );
    let profiles = procs.profiles(BULK_LIMIT as usize).await;

    let bundle = ExportBundle {
        users: Vec::new(),
        profiles: or_empty("profiles", profiles),
        pooja_bookings: or_empty("pooja_bookings", pooja),
        annadanam_bookings: or_empty("annadanam_bookings", annadanam),
        donations: or_empty("donations", donations),
        contact_messages: or_empty("contact_messages", contact),
        volunteer_bookings: or_empty("volunteer_bookings", volunteers),
    };
    info!(
        pooja = bundle.pooja_bookings.len(),
        annadanam = bundle.annadanam_bookings.len(),
        donations = bundle.donations.len(),
        contact = bundle.contact_messages.len(),
        volunteers = bundle.volunteer_bookings.len(),
        profiles = bundle.profiles.len(),
        "export: bulk export assembled"
    );
    bundle
}
