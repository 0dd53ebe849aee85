//! Admin export files: CSV, pretty JSON, table PDF, and the bulk bundle.
//!
//! DESIGN
//! ======
//! Exports are rendered entirely in memory from rows the backend already
//! returned. Every format is well-formed for zero rows: CSV is the header
//! line alone, JSON is `[]`, and PDF shows a "No data" row. An empty export
//! is never an error.

pub mod bundle;
pub mod csv;
pub mod pdf;

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;

use crate::models::Row;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("export serialization failed: {0}")]
    Serialize(String),
}

impl crate::error::ErrorCode for ExportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "E_EXPORT_FORMAT",
            Self::Serialize(_) => "E_EXPORT_SERIALIZE",
        }
    }
}

// =============================================================================
// FORMATS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Pdf,
}

impl ExportFormat {
    /// Parse the `format` query value. Absent or blank means "no export,
    /// return the JSON view".
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnsupportedFormat`] for anything but
    /// `json`, `csv` or `pdf`.
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, ExportError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "json" => Ok(Some(Self::Json)),
            "csv" => Ok(Some(Self::Csv)),
            "pdf" => Ok(Some(Self::Pdf)),
            _ => Err(ExportError::UnsupportedFormat(raw.to_string())),
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }
}

/// A rendered export ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    fn new(stem: &str, format: ExportFormat, bytes: Vec<u8>) -> Self {
        Self { filename: format!("{stem}.{}", format.extension()), content_type: format.content_type(), bytes }
    }
}

// =============================================================================
// TABLE SPEC
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One PDF column: row key, header label, width in points, alignment.
#[derive(Debug, Clone)]
pub struct Column {
    pub key: Cow<'static, str>,
    pub label: Cow<'static, str>,
    pub width: f32,
    pub align: Align,
}

impl Column {
    pub const GENERIC_WIDTH: f32 = 120.0;

    #[must_use]
    pub const fn left(key: &'static str, label: &'static str, width: f32) -> Self {
        Self { key: Cow::Borrowed(key), label: Cow::Borrowed(label), width, align: Align::Left }
    }

    #[must_use]
    pub const fn center(key: &'static str, label: &'static str, width: f32) -> Self {
        Self { key: Cow::Borrowed(key), label: Cow::Borrowed(label), width, align: Align::Center }
    }

    #[must_use]
    pub const fn right(key: &'static str, label: &'static str, width: f32) -> Self {
        Self { key: Cow::Borrowed(key), label: Cow::Borrowed(label), width, align: Align::Right }
    }

    /// Left-aligned columns labelled by their keys, for rows whose shape
    /// is only known at runtime.
    #[must_use]
    pub fn from_keys(keys: &[String]) -> Vec<Self> {
        keys.iter()
            .map(|key| Self {
                key: Cow::Owned(key.clone()),
                label: Cow::Owned(key.clone()),
                width: Self::GENERIC_WIDTH,
                align: Align::Left,
            })
            .collect()
    }
}

/// How one admin listing exports: file stem, CSV keys, PDF title and columns.
pub struct TableExport<'a> {
    pub stem: String,
    pub title: &'a str,
    pub subtitle: Option<&'a str>,
    pub csv_keys: Vec<String>,
    pub pdf_columns: Vec<Column>,
}

impl TableExport<'_> {
    /// Render `rows` in `format`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialize`] if JSON encoding fails.
    pub fn render(&self, format: ExportFormat, rows: &[Row]) -> Result<ExportFile, ExportError> {
        let bytes = match format {
            ExportFormat::Json => json_pretty(&rows)?,
            ExportFormat::Csv => csv::table(&self.csv_keys, rows).into_bytes(),
            ExportFormat::Pdf => pdf::render(&pdf::TableDocument {
                title: self.title,
                subtitle: self.subtitle,
                columns: &self.pdf_columns,
                rows,
            }),
        };
        Ok(ExportFile::new(&self.stem, format, bytes))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Two-space indented JSON.
///
/// # Errors
///
/// Returns [`ExportError::Serialize`] if `value` can't be encoded.
pub fn json_pretty(value: &impl Serialize) -> Result<Vec<u8>, ExportError> {
    serde_json::to_vec_pretty(value).map_err(|e| ExportError::Serialize(e.to_string()))
}

/// Display text of a cell: null is empty, strings are verbatim, nested
/// values are compact JSON.
#[must_use]
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// `base` or `base-DATE`.
#[must_use]
pub fn dated_stem(base: &str, date: Option<&str>) -> String {
    match date.filter(|d| !d.is_empty()) {
        Some(date) => format!("{base}-{date}"),
        None => base.to_string(),
    }
}

/// `base`, or `base-START-END` when either bound is set (a missing bound
/// leaves its slot empty).
#[must_use]
pub fn range_stem(base: &str, start: Option<&str>, end: Option<&str>) -> String {
    let start = start.unwrap_or("");
    let end = end.unwrap_or("");
    if start.is_empty() && end.is_empty() {
        base.to_string()
    } else {
        format!("{base}-{start}-{end}")
    }
}
