//! Single-font tabular PDF writer.
//!
//! DESIGN
//! ======
//! Emits a PDF 1.4 file by hand: one catalog, one page tree, one Helvetica
//! font resource (a standard Type 1 font, so nothing is embedded), and one
//! page object plus content stream per page. Text is WinAnsi-encoded;
//! characters outside Latin-1 are replaced with `?`.
//!
//! Layout is A4 landscape. When the column widths don't fit, the page grows
//! wider instead of shrinking the text. The header row repeats on every
//! page. Cell text is clipped to the column width using an average glyph
//! width, which is close enough for Helvetica at table sizes.

use std::fmt::Write as _;
use std::ops::Range;

use super::{Align, Column};
use crate::export::csv::text_of;
use crate::models::Row;

const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const MARGIN: f32 = 40.0;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 10.0;
const CELL_SIZE: f32 = 9.0;
const ROW_HEIGHT: f32 = 18.0;
const CELL_PADDING: f32 = 4.0;
const AVG_GLYPH_EM: f32 = 0.52;
const EMPTY_NOTICE: &str = "No data";

/// A titled table ready to be rendered.
pub struct TableDocument<'a> {
    pub title: &'a str,
    pub subtitle: Option<&'a str>,
    pub columns: &'a [Column],
    pub rows: &'a [Row],
}

// =============================================================================
// LAYOUT
// =============================================================================

struct Layout {
    width: f32,
    table_width: f32,
    first_table_top: f32,
    first_capacity: usize,
    rest_capacity: usize,
}

impl Layout {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn new(doc: &TableDocument<'_>) -> Self {
        let table_width: f32 = doc.columns.iter().map(|c| c.width).sum();
        let width = PAGE_WIDTH.max(table_width + 2.0 * MARGIN);

        let mut first_table_top = PAGE_HEIGHT - MARGIN - TITLE_SIZE - 10.0;
        if doc.subtitle.is_some() {
            first_table_top -= SUBTITLE_SIZE + 6.0;
        }
        let rest_table_top = PAGE_HEIGHT - MARGIN;
        // one row of space is kept for the header, another for the footer
        let capacity = |top: f32| (((top - MARGIN) / ROW_HEIGHT) as usize).saturating_sub(2).max(1);

        Self {
            width,
            table_width,
            first_table_top,
            first_capacity: capacity(first_table_top),
            rest_capacity: capacity(rest_table_top),
        }
    }
}

/// Split `total` rows into page ranges. Always yields at least one page.
fn paginate(total: usize, first_capacity: usize, rest_capacity: usize) -> Vec<Range<usize>> {
    let mut pages = vec![0..total.min(first_capacity)];
    let mut start = pages[0].end;
    while start < total {
        let end = (start + rest_capacity).min(total);
        pages.push(start..end);
        start = end;
    }
    pages
}

// =============================================================================
// TEXT
// =============================================================================

#[allow(clippy::cast_precision_loss)]
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM
}

/// Clip `text` so it fits in `width` points, ending with `...` when cut.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clip(text: &str, width: f32, size: f32) -> String {
    let single_line: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let max_chars = ((width - 2.0 * CELL_PADDING) / (size * AVG_GLYPH_EM)).floor().max(0.0) as usize;
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    if max_chars <= 3 {
        return single_line.chars().take(max_chars).collect();
    }
    let mut clipped: String = single_line.chars().take(max_chars - 3).collect();
    clipped.push_str("...");
    clipped
}

/// PDF literal string body in WinAnsi, with `\`, `(` and `)` escaped.
#[allow(clippy::cast_possible_truncation)]
fn pdf_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c if (c as u32) < 0x20 => out.push(b' '),
            c if (c as u32) <= 0xFF => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

// =============================================================================
// CONTENT STREAMS
// =============================================================================

struct Canvas {
    ops: Vec<u8>,
}

impl Canvas {
    fn new() -> Self {
        Self { ops: Vec::new() }
    }

    fn raw(&mut self, op: &str) {
        self.ops.extend_from_slice(op.as_bytes());
        self.ops.push(b'\n');
    }

    fn text(&mut self, x: f32, y: f32, size: f32, text: &str) {
        self.raw(&format!("BT /F1 {size:.1} Tf {x:.2} {y:.2} Td"));
        self.ops.push(b'(');
        self.ops.extend_from_slice(&pdf_string(text));
        self.ops.extend_from_slice(b") Tj ET\n");
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32) {
        self.raw(&format!("{x1:.2} {y:.2} m {x2:.2} {y:.2} l S"));
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, gray: f32) {
        self.raw(&format!("{gray:.2} g {x:.2} {y:.2} {w:.2} {h:.2} re f 0 g"));
    }

    fn cell(&mut self, column: &Column, x: f32, baseline: f32, text: &str) {
        let clipped = clip(text, column.width, CELL_SIZE);
        let used = text_width(&clipped, CELL_SIZE);
        let tx = match column.align {
            Align::Left => x + CELL_PADDING,
            Align::Center => x + (column.width - used) / 2.0,
            Align::Right => x + column.width - CELL_PADDING - used,
        };
        self.text(tx.max(x), baseline, CELL_SIZE, &clipped);
    }
}

fn header_row(canvas: &mut Canvas, columns: &[Column], table_width: f32, top: f32) {
    canvas.fill_rect(MARGIN, top - ROW_HEIGHT, table_width, ROW_HEIGHT, 0.9);
    let baseline = top - ROW_HEIGHT + 6.0;
    let mut x = MARGIN;
    for column in columns {
        canvas.cell(column, x, baseline, &column.label);
        x += column.width;
    }
    canvas.rule(MARGIN, MARGIN + table_width, top - ROW_HEIGHT);
}

fn page_content(doc: &TableDocument<'_>, layout: &Layout, rows: Range<usize>, page: usize, pages: usize) -> Vec<u8> {
    let mut canvas = Canvas::new();
    let top = if page == 0 {
        let mut y = PAGE_HEIGHT - MARGIN - TITLE_SIZE;
        canvas.text(MARGIN, y, TITLE_SIZE, doc.title);
        if let Some(subtitle) = doc.subtitle {
            y -= SUBTITLE_SIZE + 6.0;
            canvas.text(MARGIN, y, SUBTITLE_SIZE, subtitle);
        }
        layout.first_table_top
    } else {
        PAGE_HEIGHT - MARGIN
    };

    header_row(&mut canvas, doc.columns, layout.table_width, top);

    let mut y = top - ROW_HEIGHT;
    if doc.rows.is_empty() {
        canvas.text(MARGIN + CELL_PADDING, y - ROW_HEIGHT + 6.0, CELL_SIZE, EMPTY_NOTICE);
    }
    for row in &doc.rows[rows] {
        let baseline = y - ROW_HEIGHT + 6.0;
        let mut x = MARGIN;
        for column in doc.columns {
            canvas.cell(column, x, baseline, &text_of(row.get(column.key.as_ref())));
            x += column.width;
        }
        y -= ROW_HEIGHT;
    }

    if pages > 1 {
        let footer = format!("Page {} of {pages}", page + 1);
        canvas.text(layout.width - MARGIN - text_width(&footer, CELL_SIZE), MARGIN / 2.0, CELL_SIZE, &footer);
    }
    canvas.ops
}

// =============================================================================
// FILE ASSEMBLY
// =============================================================================

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self { buf, offsets: Vec::new() }
    }

    /// Append object `id`; ids must be written in ascending order from 1.
    fn object(&mut self, body: &[u8]) {
        self.offsets.push(self.buf.len());
        let id = self.offsets.len();
        self.buf.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, content: &[u8]) {
        let mut body = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(b"\nendstream");
        self.object(&body);
    }

    fn finish(mut self, catalog: usize) -> Vec<u8> {
        let xref_at = self.buf.len();
        let count = self.offsets.len() + 1;
        let mut xref = format!("xref\n0 {count}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            let _ = writeln!(xref, "{offset:010} 00000 n ");
        }
        let _ = write!(xref, "trailer\n<< /Size {count} /Root {catalog} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n");
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}

/// Render `doc` as a complete PDF file.
#[must_use]
pub fn render(doc: &TableDocument<'_>) -> Vec<u8> {
    let layout = Layout::new(doc);
    let pages = paginate(doc.rows.len(), layout.first_capacity, layout.rest_capacity);
    let page_count = pages.len();

    // Object ids: 1 catalog, 2 page tree, 3 font, then (page, content) pairs.
    let page_ids: Vec<usize> = (0..page_count).map(|i| 4 + 2 * i).collect();

    let mut writer = PdfWriter::new();
    writer.object(b"<< /Type /Catalog /Pages 2 0 R >>");
    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    writer.object(format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>").as_bytes());
    writer.object(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>");

    for (index, range) in pages.into_iter().enumerate() {
        let content_id = page_ids[index] + 1;
        writer.object(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.0} {:.0}] /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>",
                layout.width, PAGE_HEIGHT
            )
            .as_bytes(),
        );
        writer.stream(&page_content(doc, &layout, range, index, page_count));
    }

    writer.finish(1)
}

#[cfg(test)]
#[path = "pdf_test.rs"]
mod tests;
