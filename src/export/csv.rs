//! Minimal CSV writer.
//!
//! Only the quoting rule the admin exports need: a field containing `,`, `"`
//! or a newline is wrapped in quotes with inner quotes doubled. Lines are
//! joined with `\n`.

use std::borrow::Cow;

use serde_json::Value;

use super::cell_text;
use crate::models::Row;

#[must_use]
pub fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// One CSV line for `row`, reading `keys` in order. Missing keys are empty.
#[must_use]
pub fn line<K: AsRef<str>>(keys: &[K], row: &Row) -> String {
    keys.iter()
        .map(|key| {
            let text = row.get(key.as_ref()).map(cell_text).unwrap_or_default();
            escape(&text).into_owned()
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Header line plus one line per row, joined with `\n` (no trailing newline).
/// Zero rows yields the header line alone.
#[must_use]
pub fn table<K: AsRef<str>>(keys: &[K], rows: &[Row]) -> String {
    let header = keys.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header);
    lines.extend(rows.iter().map(|row| line(keys, row)));
    lines.join("\n")
}

/// Keys of the first row in their original order.
#[must_use]
pub fn keys_of_first(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Render a scalar for display, e.g. for a CSV cell or PDF cell.
#[must_use]
pub fn text_of(value: Option<&Value>) -> String {
    value.map(cell_text).unwrap_or_default()
}
