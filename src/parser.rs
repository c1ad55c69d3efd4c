//! Document segmentation parser.
//!
//! Splits raw page/section/line structured text (RFC-style) into sections of
//! parsed lines with per-token offsets and stems. Parsing is a pure
//! function: the same input text always yields the same structure, which the
//! round-trip tests rely on.
//!
//! Segmentation rules:
//! - a line that is empty after trimming closes the current section;
//! - a line whose tail matches the page-footer pattern (`[Page N]` anchored
//!   at end of line, optionally preceded by a word or two) belongs to the
//!   section it closes; the section keeps the page number *before* the
//!   increment;
//! - everything else accumulates into the current section.
//!
//! All offsets are character offsets into the de-indented line text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::stemmer::Stemmer;

static PAGE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:(?:\S+\s+)?\S+\s+)?\[Page \d+\]\s*$").unwrap());

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

/// One word occurrence within a parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub word: String,
    /// Character offset of the word within the de-indented line text.
    pub start: usize,
    /// One past the last character of the word.
    pub end: usize,
    pub stem: String,
}

/// One non-blank line: de-indented text plus its token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub text: String,
    /// Leading-whitespace width of the raw line, in characters.
    pub indentation: usize,
    /// Document-wide line number (1-based, counts blank lines too).
    pub absolute_line: i64,
    pub tokens: Vec<ParsedToken>,
}

/// A maximal run of non-blank lines within one page. The vector index of a
/// line is its section-local line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSection {
    pub page: i64,
    /// Page-local line number of the section's first line (1-based).
    pub row_start: i64,
    pub lines: Vec<ParsedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub sections: Vec<ParsedSection>,
}

impl ParsedDocument {
    /// Total token occurrences across all sections.
    pub fn token_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.lines)
            .map(|l| l.tokens.len())
            .sum()
    }
}

/// Split free text into its word tokens (no offsets, no stems). Used for
/// phrase text, which shares the document tokenizer's notion of a word.
pub fn tokenize_words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Parse one raw line into de-indented text and word tokens.
///
/// Word offsets come from a single left-to-right regex scan, so repeated
/// words get strictly increasing, non-overlapping offsets.
pub fn parse_line(raw: &str, absolute_line: i64, stemmer: &Stemmer) -> ParsedLine {
    let text = raw.trim();
    let indentation = raw.chars().take_while(|c| c.is_whitespace()).count();

    let mut tokens = Vec::new();
    for m in WORD_RE.find_iter(text) {
        let word = m.as_str();
        let start = text[..m.start()].chars().count();
        let end = start + word.chars().count();
        tokens.push(ParsedToken {
            word: word.to_string(),
            start,
            end,
            stem: stemmer.stem(word),
        });
    }

    ParsedLine {
        text: text.to_string(),
        indentation,
        absolute_line,
        tokens,
    }
}

/// Segment a whole document into sections.
///
/// Never fails: malformed input (for example a document that ends
/// mid-section) simply yields whatever sections were accumulated.
pub fn parse_document(text: &str, stemmer: &Stemmer) -> ParsedDocument {
    let mut sections = Vec::new();

    let mut current: Vec<ParsedLine> = Vec::new();
    let mut row_start: i64 = 0;
    let mut page: i64 = 1;
    let mut line_in_page: i64 = 0;
    let mut absolute_line: i64 = 0;

    for raw in text.lines() {
        absolute_line += 1;
        line_in_page += 1;

        if raw.trim().is_empty() {
            close_section(&mut sections, &mut current, row_start, page);
            continue;
        }

        if current.is_empty() {
            row_start = line_in_page;
        }
        current.push(parse_line(raw, absolute_line, stemmer));

        if PAGE_END_RE.is_match(raw) {
            close_section(&mut sections, &mut current, row_start, page);
            page += 1;
            line_in_page = 0;
        }
    }

    close_section(&mut sections, &mut current, row_start, page);

    ParsedDocument { sections }
}

fn close_section(
    sections: &mut Vec<ParsedSection>,
    current: &mut Vec<ParsedLine>,
    row_start: i64,
    page: i64,
) {
    if !current.is_empty() {
        sections.push(ParsedSection {
            page,
            row_start,
            lines: std::mem::take(current),
        });
    }
}
