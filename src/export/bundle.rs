//! Bulk admin export: every listing in one file.

use serde::Serialize;
use time::Date;

use super::{ExportError, ExportFile, ExportFormat, csv, json_pretty};
use crate::models::Row;

const EMPTY_SECTION: &str = "No data";

/// All admin datasets for a date range. Field order is the JSON key order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportBundle {
    /// Always empty: auth users are not readable with a caller's token.
    pub users: Vec<Row>,
    pub profiles: Vec<Row>,
    pub pooja_bookings: Vec<Row>,
    pub annadanam_bookings: Vec<Row>,
    pub donations: Vec<Row>,
    pub contact_messages: Vec<Row>,
    pub volunteer_bookings: Vec<Row>,
}

impl ExportBundle {
    /// Named sections in CSV order.
    #[must_use]
    pub fn sections(&self) -> [(&'static str, &[Row]); 7] {
        [
            ("Users", self.users.as_slice()),
            ("Profiles", self.profiles.as_slice()),
            ("Pooja Bookings", self.pooja_bookings.as_slice()),
            ("Annadanam Bookings", self.annadanam_bookings.as_slice()),
            ("Donations", self.donations.as_slice()),
            ("Contact Messages", self.contact_messages.as_slice()),
            ("Volunteer Bookings", self.volunteer_bookings.as_slice()),
        ]
    }

    /// Sectioned CSV. Each section's header is the key set of its first row.
    #[must_use]
    pub fn to_csv(&self, generated_at: &str, start: Option<&str>, end: Option<&str>) -> String {
        let mut out = format!(
            "Admin Data Export - {generated_at}\nDate Range: {} to {}\n\n",
            start.unwrap_or("all"),
            end.unwrap_or("all")
        );
        for (name, rows) in self.sections() {
            out.push('\n');
            out.push_str(name);
            out.push('\n');
            if rows.is_empty() {
                out.push_str(EMPTY_SECTION);
                out.push('\n');
                continue;
            }
            let keys = csv::keys_of_first(rows);
            out.push_str(&keys.join(","));
            out.push('\n');
            for row in rows {
                out.push_str(&csv::line(&keys, row));
                out.push('\n');
            }
        }
        out
    }

    /// Render as `admin-export-YYYY-MM-DD.{json,csv}`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnsupportedFormat`] for PDF and
    /// [`ExportError::Serialize`] if JSON encoding fails.
    pub fn render(
        &self,
        format: ExportFormat,
        today: Date,
        generated_at: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<ExportFile, ExportError> {
        let bytes = match format {
            ExportFormat::Json => json_pretty(self)?,
            ExportFormat::Csv => self.to_csv(generated_at, start, end).into_bytes(),
            ExportFormat::Pdf => return Err(ExportError::UnsupportedFormat("pdf".into())),
        };
        Ok(ExportFile::new(&format!("admin-export-{today}"), format, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use time::macros::date;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_bundle_csv_lists_every_section_as_no_data() {
        let csv = ExportBundle::default().to_csv("2025-11-20T10:00:00Z", None, None);
        assert!(csv.starts_with("Admin Data Export - 2025-11-20T10:00:00Z\nDate Range: all to all\n\n"));
        assert_eq!(csv.matches("No data\n").count(), 7);
        assert!(csv.contains("\nUsers\nNo data\n"));
        assert!(csv.ends_with("\nVolunteer Bookings\nNo data\n"));
    }

    #[test]
    fn sections_use_first_row_keys_and_escape() {
        let bundle = ExportBundle {
            donations: vec![
                row(json!({ "name": "A, B", "amount": 100 })),
                row(json!({ "name": "C", "amount": 50, "extra": "ignored" })),
            ],
            ..ExportBundle::default()
        };
        let csv = bundle.to_csv("now", Some("2025-11-01"), Some("2025-11-30"));
        assert!(csv.contains("Date Range: 2025-11-01 to 2025-11-30\n"));
        assert!(csv.contains("\nDonations\nname,amount\n\"A, B\",100\nC,50\n"));
    }

    #[test]
    fn json_has_all_keys_including_empty_users() {
        let file = ExportBundle::default()
            .render(ExportFormat::Json, date!(2025 - 11 - 20), "now", None, None)
            .unwrap();
        assert_eq!(file.filename, "admin-export-2025-11-20.json");
        let value: Value = serde_json::from_slice(&file.bytes).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec![
                "users",
                "profiles",
                "pooja_bookings",
                "annadanam_bookings",
                "donations",
                "contact_messages",
                "volunteer_bookings"
            ]
        );
        assert_eq!(value["users"], json!([]));
    }

    #[test]
    fn pdf_is_not_offered_for_bulk() {
        let err = ExportBundle::default()
            .render(ExportFormat::Pdf, date!(2025 - 11 - 20), "now", None, None)
            .unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(_)));
    }
}
