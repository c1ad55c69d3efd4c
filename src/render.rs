//! Document reconstruction and highlight helpers.
//!
//! `rebuild_document` is the inverse of segmentation: sections sorted by
//! their first absolute line, blank lines reinserted into the gaps, stored
//! indentation re-applied. The result matches the ingested text byte for
//! byte, modulo the per-line trailing-whitespace trim the parser applies.

use rusqlite::Connection;

use crate::interface::{AbsolutePosition, CorpusResult};

/// One stored line with enough coordinates to re-place it in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuiltLine {
    pub abs_line: i64,
    pub indentation: i64,
    pub text: String,
}

/// A stored section's lines in order. The section's absolute span comes
/// from its lines, not from the page-local row numbers on the section row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuiltSection {
    pub lines: Vec<RebuiltLine>,
}

impl RebuiltSection {
    fn abs_start(&self) -> i64 {
        self.lines.first().map(|l| l.abs_line).unwrap_or(0)
    }
}

/// Reassemble a document from its stored sections.
pub fn rebuild_document(sections: &[RebuiltSection]) -> String {
    let mut sorted: Vec<&RebuiltSection> = sections.iter().filter(|s| !s.lines.is_empty()).collect();
    if sorted.is_empty() {
        return String::new();
    }
    sorted.sort_by_key(|s| s.abs_start());

    let mut out: Vec<String> = Vec::new();
    let mut current_row: i64 = 1;

    for section in sorted {
        for _ in current_row..section.abs_start() {
            out.push(String::new());
        }
        for line in &section.lines {
            let mut rendered = " ".repeat(line.indentation as usize);
            rendered.push_str(&line.text);
            out.push(rendered);
        }
        current_row = section.lines.last().map(|l| l.abs_line).unwrap_or(current_row) + 1;
    }

    out.join("\n")
}

/// Fetch a document's sections with their lines, ordered for rebuilding.
pub(crate) fn fetch_sections(conn: &Connection, doc_num: i64) -> CorpusResult<Vec<RebuiltSection>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, l.abs_line_number, l.indentation, l.text
         FROM lines l
         JOIN sections s ON s.id = l.section_id
         WHERE s.doc_num = ?1
         ORDER BY s.section_index, l.line_number",
    )?;

    let mut sections: Vec<RebuiltSection> = Vec::new();
    let mut last_section_id: Option<i64> = None;
    let rows = stmt.query_map([doc_num], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            RebuiltLine {
                abs_line: row.get(1)?,
                indentation: row.get(2)?,
                text: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (section_id, line) = row?;
        if last_section_id != Some(section_id) {
            sections.push(RebuiltSection { lines: Vec::new() });
            last_section_id = Some(section_id);
        }
        if let Some(section) = sections.last_mut() {
            section.lines.push(line);
        }
    }
    Ok(sections)
}

/// Map a stored token occurrence to a render-ready highlight span.
pub fn to_highlight(abs_line: i64, indentation: i64, start: i64, end: i64) -> AbsolutePosition {
    AbsolutePosition {
        line: abs_line,
        column: indentation + start,
        length: end - start,
    }
}

/// Bounded excerpt of `text` centered on the span `[start, end)`.
///
/// The span is bracketed; truncated ends are replaced with `...`. When
/// `max_length` covers the whole text, the original is returned with the
/// span marked instead of truncating. The non-highlight budget is split
/// evenly before and after the span, clamped to the text bounds.
pub fn excerpt(text: &str, start: usize, end: usize, max_length: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let start = start.min(len);
    let end = end.clamp(start, len);

    let mark = |from: usize, to: usize| -> String { chars[from..to].iter().collect() };

    if len <= max_length {
        return format!("{}[{}]{}", mark(0, start), mark(start, end), mark(end, len));
    }

    // Room for the brackets and both ellipsis markers.
    let length = max_length.max(7);
    let highlight_len = end - start;
    let available = length.saturating_sub(5 + highlight_len);
    let left_context = available / 2;

    let window = length - 5;
    let latest_start = len.saturating_sub(window);
    let window_start = start.saturating_sub(left_context).min(latest_start);
    let window_end = (window_start + window).min(len);

    let mut result = String::new();
    if window_start > 0 {
        result.push_str("...");
    }
    if window_start < start {
        result.push_str(&mark(window_start, start));
    }
    result.push('[');
    result.push_str(&mark(start, end));
    result.push(']');
    if end < window_end {
        result.push_str(&mark(end, window_end));
    }
    if window_end.max(end) < len {
        result.push_str("...");
    }

    result
}
