//! CorpusStore - the library's main entry point.
//!
//! Owns the database handle and the stemmer, and exposes the full
//! ingestion/query API. Mutating operations each run in one transaction on
//! a pooled connection: on error nothing is committed and the error
//! propagates; reads run concurrently on their own pooled connections.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::database::Database;
use crate::interface::{
    AbsoluteQuery, CorpusError, CorpusResult, DocumentMatch, DocumentMeta,
    DocumentOccurrences, Paginated, PhraseOccurrence, PositionHit, RelativeQuery,
    SearchQuery, TokenOccurrence, WordEntry, WordQuery,
};
use crate::parser::parse_document;
use crate::render::{self, rebuild_document};
use crate::stats::{self, TextStatistics};
use crate::stemmer::Stemmer;
use crate::{groups, ingest, phrases, positions, search, words};

/// Name of the metadata sidecar consumed by [`CorpusStore::load_corpus`].
pub const CORPUS_MANIFEST: &str = "corpus.json";

pub struct CorpusStore {
    db: Database,
    stemmer: Stemmer,
}

impl CorpusStore {
    /// Open or create a corpus at the given database path.
    pub fn open<P: AsRef<Path>>(path: P) -> CorpusResult<Self> {
        Ok(Self { db: Database::open(path)?, stemmer: Stemmer::new() })
    }

    /// Open an in-memory corpus (tests, ephemeral usage).
    pub fn open_in_memory() -> CorpusResult<Self> {
        Ok(Self { db: Database::open_in_memory()?, stemmer: Stemmer::new() })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────────

    /// Parse and ingest one document. Fails with `DuplicateDocument` if the
    /// number is already present; see [`CorpusStore::replace_document`] for
    /// overwrite semantics.
    pub fn ingest(&self, meta: &DocumentMeta, raw_text: &str) -> CorpusResult<DocumentMeta> {
        let parsed = parse_document(raw_text, &self.stemmer);
        let conn = self.db.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        ingest::write_document(&tx, meta, &parsed)?;
        tx.commit()?;
        Ok(meta.clone())
    }

    /// Replace an existing document (or ingest it fresh if absent): the old
    /// rows are deleted and the new text ingested in one transaction.
    pub fn replace_document(
        &self,
        meta: &DocumentMeta,
        raw_text: &str,
    ) -> CorpusResult<DocumentMeta> {
        let parsed = parse_document(raw_text, &self.stemmer);
        let conn = self.db.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM documents WHERE num = ?1", [meta.num])?;
        ingest::write_document(&tx, meta, &parsed)?;
        tx.commit()?;
        info!(num = meta.num, "document replaced");
        Ok(meta.clone())
    }

    /// Read a UTF-8 text file and ingest it under the given metadata.
    pub fn ingest_file<P: AsRef<Path>>(
        &self,
        path: P,
        meta: &DocumentMeta,
    ) -> CorpusResult<DocumentMeta> {
        let raw_text = fs::read_to_string(&path).map_err(|e| {
            CorpusError::Validation(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        self.ingest(meta, &raw_text)
    }

    /// Load a directory of documents: `corpus.json` holds an array of
    /// document metadata, and each entry's text lives in `{num}.txt` next
    /// to it. Returns the metadata of every ingested document.
    pub fn load_corpus<P: AsRef<Path>>(&self, dir: P) -> CorpusResult<Vec<DocumentMeta>> {
        let dir = dir.as_ref();
        let manifest = fs::read_to_string(dir.join(CORPUS_MANIFEST)).map_err(|e| {
            CorpusError::Validation(format!("cannot read {}: {}", CORPUS_MANIFEST, e))
        })?;
        let entries: Vec<DocumentMeta> = serde_json::from_str(&manifest)
            .map_err(|e| CorpusError::Validation(format!("malformed {}: {}", CORPUS_MANIFEST, e)))?;

        let mut loaded = Vec::with_capacity(entries.len());
        for meta in entries {
            let text_path = dir.join(format!("{}.txt", meta.num));
            loaded.push(self.ingest_file(text_path, &meta)?);
        }
        info!(documents = loaded.len(), "corpus loaded");
        Ok(loaded)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Ranked document search; TF-IDF ranked when tokens are given,
    /// newest-first otherwise.
    pub fn search(&self, query: &SearchQuery) -> CorpusResult<Vec<DocumentMatch>> {
        let conn = self.db.get_conn()?;
        search::search_documents(&conn, &self.stemmer, query)
    }

    /// Every occurrence of a literal phrase, matched contiguously.
    pub fn find_phrase(&self, phrase_text: &str) -> CorpusResult<Vec<PhraseOccurrence>> {
        let conn = self.db.get_conn()?;
        phrases::find_phrase(&conn, phrase_text)
    }

    /// Tokens at an absolute (line, column) coordinate.
    pub fn absolute_search(&self, query: &AbsoluteQuery) -> CorpusResult<Paginated<PositionHit>> {
        let conn = self.db.get_conn()?;
        positions::absolute_search(&conn, query)
    }

    /// Tokens at a section-relative coordinate.
    pub fn relative_search(&self, query: &RelativeQuery) -> CorpusResult<Paginated<PositionHit>> {
        let conn = self.db.get_conn()?;
        positions::relative_search(&conn, query)
    }

    /// Faceted word index page.
    pub fn query_words(&self, query: &WordQuery) -> CorpusResult<Paginated<WordEntry>> {
        let conn = self.db.get_conn()?;
        words::query_words(&conn, query)
    }

    /// Per-document occurrence counts for one surface form.
    pub fn document_occurrences(
        &self,
        token: &str,
        title: Option<&str>,
    ) -> CorpusResult<Vec<DocumentOccurrences>> {
        let conn = self.db.get_conn()?;
        words::document_occurrences(&conn, token, title)
    }

    /// Every occurrence of one surface form within one document.
    pub fn occurrences(&self, token: &str, doc_num: i64) -> CorpusResult<Vec<TokenOccurrence>> {
        let conn = self.db.get_conn()?;
        words::occurrences(&conn, token, doc_num)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Phrases
    // ─────────────────────────────────────────────────────────────────────────

    /// Save a named phrase; every word must already be in the dictionary.
    pub fn save_phrase(&self, name: &str, text: &str) -> CorpusResult<()> {
        let conn = self.db.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        phrases::save_phrase(&tx, name, text)?;
        tx.commit()?;
        Ok(())
    }

    /// Occurrences of a saved phrase, by name.
    pub fn phrase_occurrences(&self, name: &str) -> CorpusResult<Vec<PhraseOccurrence>> {
        let conn = self.db.get_conn()?;
        phrases::phrase_occurrences(&conn, name)
    }

    /// Names of all saved phrases.
    pub fn list_phrases(&self) -> CorpusResult<Vec<String>> {
        let conn = self.db.get_conn()?;
        phrases::list_phrases(&conn)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token groups
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a named group, optionally with initial words.
    pub fn create_group(&self, name: &str, words: &[String]) -> CorpusResult<()> {
        let conn = self.db.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        groups::create_group(&tx, &self.stemmer, name, words)?;
        tx.commit()?;
        Ok(())
    }

    /// Add words to a group, creating unknown tokens with their stems.
    pub fn add_words(&self, name: &str, words: &[String]) -> CorpusResult<()> {
        let conn = self.db.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        groups::add_words(&tx, &self.stemmer, name, words)?;
        tx.commit()?;
        Ok(())
    }

    /// Unlink words from a group; the tokens themselves are kept.
    pub fn remove_words(&self, name: &str, words: &[String]) -> CorpusResult<()> {
        let conn = self.db.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        groups::remove_words(&tx, name, words)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_groups(&self) -> CorpusResult<Vec<String>> {
        let conn = self.db.get_conn()?;
        groups::list_groups(&conn)
    }

    pub fn list_words(&self, name: &str) -> CorpusResult<Vec<String>> {
        let conn = self.db.get_conn()?;
        groups::list_words(&conn, name)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    /// Reassemble a document's text from its stored sections.
    pub fn rebuild_document(&self, doc_num: i64) -> CorpusResult<String> {
        if !self.db.document_exists(doc_num)? {
            return Err(CorpusError::NotFound(format!("document {}", doc_num)));
        }
        let conn = self.db.get_conn()?;
        let sections = render::fetch_sections(&conn, doc_num)?;
        Ok(rebuild_document(&sections))
    }

    /// Per-line distribution statistics of a stored document's text.
    pub fn document_stats(&self, doc_num: i64) -> CorpusResult<TextStatistics> {
        let text = self.rebuild_document(doc_num)?;
        Ok(stats::analyze(&text))
    }

    /// Total number of ingested documents.
    pub fn count_documents(&self) -> CorpusResult<i64> {
        Ok(self.db.count_documents()?)
    }
}
