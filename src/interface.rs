//! Public interface types for the corpus store.
//!
//! Everything a presentation layer needs to submit queries and render
//! results (with highlights) lives here; the structs mirror what the
//! query modules return and carry no storage handles.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render;

// ─────────────────────────────────────────────────────────────────────────────
// DOCUMENTS
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata identifying one document in the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Unique document number (e.g. the RFC number).
    pub num: i64,
    pub title: String,
    pub published_at: NaiveDate,
    /// Author names; order is not significant.
    pub authors: Vec<String>,
}

/// One ranked-search result: document metadata plus its TF-IDF rank.
/// `rank` is `None` when the query carried no tokens (date-ordered results).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMatch {
    pub meta: DocumentMeta,
    pub rank: Option<f64>,
}

/// Filters for ranked document search. All fields are optional and combine
/// with logical AND.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Exact document number.
    pub num: Option<i64>,
    /// Case-insensitive title substring.
    pub title: Option<String>,
    /// Every listed author must substring-match at least one recorded author.
    pub authors: Option<Vec<String>>,
    /// Inclusive publication-date range.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Query tokens; when present, results are TF-IDF ranked over stems.
    pub tokens: Option<Vec<String>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// COORDINATES
// ─────────────────────────────────────────────────────────────────────────────

/// Document-wide position of a token occurrence, expressed for rendering:
/// `column` already includes the line's indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsolutePosition {
    /// Document-wide line number (1-based, counts blank lines).
    pub line: i64,
    pub column: i64,
    pub length: i64,
}

/// Position of a token occurrence relative to its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativePosition {
    /// Zero-based section index within the document.
    pub section: i64,
    /// Page-local line number of the owning line.
    pub line: i64,
    /// Zero-based word index within the line.
    pub word: i64,
}

/// The owning line's text plus the token's offsets into it, for building
/// context excerpts around an occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineContext {
    pub content: String,
    pub start: i64,
    pub end: i64,
}

impl LineContext {
    /// Bounded excerpt of the line centered on the token, with the token
    /// bracketed and truncated ends marked with an ellipsis.
    pub fn shorten(&self, max_length: usize) -> String {
        render::excerpt(&self.content, self.start as usize, self.end as usize, max_length)
    }
}

/// One occurrence of a token inside one document, with every coordinate a
/// caller needs to jump to it or highlight it.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenOccurrence {
    pub page: i64,
    pub abs: AbsolutePosition,
    pub rel: RelativePosition,
    pub context: LineContext,
}

/// Per-document occurrence total for one token.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOccurrences {
    pub num: i64,
    pub title: String,
    pub count: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// COORDINATE SEARCH
// ─────────────────────────────────────────────────────────────────────────────

/// Lookup by absolute document coordinates (line and/or column).
#[derive(Debug, Clone, Default)]
pub struct AbsoluteQuery {
    pub title: Option<String>,
    pub abs_line: Option<i64>,
    /// Character column; a token matches if its occupied range
    /// `[indentation + start, indentation + end)` contains this column.
    pub column: Option<i64>,
    pub page: i64,
    pub page_size: i64,
}

/// Lookup by section-relative coordinates.
#[derive(Debug, Clone, Default)]
pub struct RelativeQuery {
    pub title: Option<String>,
    pub section: Option<i64>,
    pub line_in_section: Option<i64>,
    pub word_in_line: Option<i64>,
    pub page: i64,
    pub page_size: i64,
}

/// One coordinate-search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionHit {
    pub doc_num: i64,
    pub word: String,
    pub stem: String,
    pub abs_line: i64,
    /// Human-readable location summary for result lists.
    pub context: String,
}

/// A page of results plus the totals a client needs for pagination controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub results: Vec<T>,
    pub total_count: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub(crate) fn new(results: Vec<T>, total_count: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_count + page_size - 1) / page_size
        } else {
            0
        };
        Self { results, total_count, total_pages }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WORD INDEX
// ─────────────────────────────────────────────────────────────────────────────

/// Sort key for the faceted word index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Alphabetical,
    Occurrences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters and paging for the faceted word index.
#[derive(Debug, Clone)]
pub struct WordQuery {
    /// Token must belong to at least one of these groups.
    pub groups: Option<Vec<String>>,
    /// Token must occur in a document whose title contains this substring.
    pub title: Option<String>,
    /// Substring matched against surface form or stem, case-insensitive.
    pub partial: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: i64,
    pub page_size: i64,
}

impl Default for WordQuery {
    fn default() -> Self {
        Self {
            groups: None,
            title: None,
            partial: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page: 1,
            page_size: 100,
        }
    }
}

/// One row of the word index: a surface form, its stem, and its summed
/// occurrence count over the matching documents.
#[derive(Debug, Clone, PartialEq)]
pub struct WordEntry {
    pub token: String,
    pub stem: String,
    pub count: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// PHRASES
// ─────────────────────────────────────────────────────────────────────────────

/// One phrase match: the coordinates of the first token of the matched run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseOccurrence {
    pub doc_num: i64,
    pub section_index: i64,
    pub abs_line: i64,
    /// Offset of the first token within its (de-indented) line.
    pub start_offset: i64,
    /// Column on the rendered line (indentation + start offset).
    pub column: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// ERRORS
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for all corpus operations.
///
/// Queries that simply match nothing return empty result sets, never an
/// error; these variants cover invalid input, missing referents, and
/// consistency violations. Mutating operations never leave partial writes
/// behind on error.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Missing or malformed input (ingestion metadata, empty phrase text).
    #[error("invalid input: {0}")]
    Validation(String),

    /// A named group, phrase, or document does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The document number is already ingested; use replace semantics to
    /// overwrite it.
    #[error("document {0} already exists")]
    DuplicateDocument(i64),

    /// A group with this name already exists.
    #[error("group '{0}' already exists")]
    DuplicateGroup(String),

    /// A phrase with this name already exists.
    #[error("phrase '{0}' already exists")]
    DuplicatePhrase(String),

    /// A phrase word is absent from the token dictionary.
    #[error("word '{0}' is not in the token dictionary")]
    UnknownWord(String),

    #[error("storage error: {0}")]
    Database(String),
}

impl From<crate::database::DatabaseError> for CorpusError {
    fn from(e: crate::database::DatabaseError) -> Self {
        CorpusError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for CorpusError {
    fn from(e: rusqlite::Error) -> Self {
        CorpusError::Database(e.to_string())
    }
}

pub type CorpusResult<T> = Result<T, CorpusError>;
