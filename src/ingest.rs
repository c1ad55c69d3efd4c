//! Ingestion pipeline: parsed document -> index store writes.
//!
//! All writes for one document happen inside the caller's transaction, so a
//! failure anywhere leaves no partial document behind. The document-wide
//! token ordering (`abs_index`) is assigned here by a counter scoped to the
//! single call, walking sections, lines, and in-line tokens in reading
//! order.

use rusqlite::{params, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::interface::{CorpusError, CorpusResult, DocumentMeta};
use crate::parser::ParsedDocument;

/// Max placeholders per dictionary lookup batch, well under SQLite's
/// bound-parameter limit.
const TOKEN_BATCH: usize = 500;

struct PendingPosition<'a> {
    line_id: i64,
    word: &'a str,
    start: i64,
    end: i64,
    word_index: i64,
    abs_index: i64,
}

/// Write one document and everything it owns. Fails with
/// `DuplicateDocument` if the number is already present; the caller decides
/// whether to delete-and-retry (replace semantics).
pub(crate) fn write_document(
    tx: &Transaction,
    meta: &DocumentMeta,
    parsed: &ParsedDocument,
) -> CorpusResult<()> {
    validate_meta(meta)?;

    let exists: i64 = tx.query_row(
        "SELECT COUNT(*) FROM documents WHERE num = ?1",
        [meta.num],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Err(CorpusError::DuplicateDocument(meta.num));
    }

    debug!(num = meta.num, sections = parsed.sections.len(), "ingesting document");

    tx.execute(
        "INSERT INTO documents (num, title, published_at) VALUES (?1, ?2, ?3)",
        params![meta.num, meta.title, meta.published_at.format("%Y-%m-%d").to_string()],
    )?;
    for author in &meta.authors {
        tx.execute(
            "INSERT OR IGNORE INTO authors (doc_num, name) VALUES (?1, ?2)",
            params![meta.num, author],
        )?;
    }

    // First pass: structural rows, collecting every token occurrence with
    // its abs_index so the dictionary lookup can be batched afterwards.
    let mut pending: Vec<PendingPosition> = Vec::new();
    let mut stems: HashMap<&str, &str> = HashMap::new();
    let mut abs_index: i64 = 0;

    for (section_index, section) in parsed.sections.iter().enumerate() {
        let indentation = section.lines.iter().map(|l| l.indentation).min().unwrap_or(0);
        let row_end = section.row_start + section.lines.len() as i64 - 1;
        tx.execute(
            "INSERT INTO sections (doc_num, section_index, page, row_start, row_end, indentation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meta.num,
                section_index as i64,
                section.page,
                section.row_start,
                row_end,
                indentation as i64
            ],
        )?;
        let section_id = tx.last_insert_rowid();

        for (line_number, line) in section.lines.iter().enumerate() {
            tx.execute(
                "INSERT INTO lines (section_id, line_number, abs_line_number, indentation, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    section_id,
                    line_number as i64,
                    line.absolute_line,
                    line.indentation as i64,
                    line.text
                ],
            )?;
            let line_id = tx.last_insert_rowid();

            for (word_index, token) in line.tokens.iter().enumerate() {
                stems.entry(token.word.as_str()).or_insert(token.stem.as_str());
                pending.push(PendingPosition {
                    line_id,
                    word: &token.word,
                    start: token.start as i64,
                    end: token.end as i64,
                    word_index: word_index as i64,
                    abs_index,
                });
                abs_index += 1;
            }
        }
    }

    let token_ids = resolve_token_ids(tx, &stems)?;

    let mut counts: HashMap<i64, i64> = HashMap::new();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO token_positions
                 (token_id, line_id, start_position, end_position, word_index, abs_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for pos in &pending {
            let token_id = token_ids[pos.word];
            stmt.execute(params![
                token_id,
                pos.line_id,
                pos.start,
                pos.end,
                pos.word_index,
                pos.abs_index
            ])?;
            *counts.entry(token_id).or_insert(0) += 1;
        }
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO document_token_counts (doc_num, token_id, total_positions)
             VALUES (?1, ?2, ?3)",
        )?;
        for (token_id, total) in &counts {
            stmt.execute(params![meta.num, token_id, total])?;
        }
    }

    info!(
        num = meta.num,
        sections = parsed.sections.len(),
        positions = pending.len(),
        distinct_tokens = counts.len(),
        "document ingested"
    );

    Ok(())
}

fn validate_meta(meta: &DocumentMeta) -> CorpusResult<()> {
    if meta.num <= 0 {
        return Err(CorpusError::Validation("document number must be positive".into()));
    }
    if meta.title.trim().is_empty() {
        return Err(CorpusError::Validation("document title must not be empty".into()));
    }
    if meta.authors.is_empty() || meta.authors.iter().any(|a| a.trim().is_empty()) {
        return Err(CorpusError::Validation(
            "document must list at least one non-empty author".into(),
        ));
    }
    Ok(())
}

/// Dictionary lookup/creation, batched: fetch existing surface forms with
/// `IN` queries, then insert only the missing ones with their stems.
fn resolve_token_ids<'a>(
    tx: &Transaction,
    stems: &HashMap<&'a str, &'a str>,
) -> CorpusResult<HashMap<&'a str, i64>> {
    let words: Vec<&str> = stems.keys().copied().collect();
    let mut ids: HashMap<&str, i64> = HashMap::with_capacity(words.len());

    for chunk in words.chunks(TOKEN_BATCH) {
        let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT token, id FROM tokens WHERE token IN ({})", placeholders);
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(chunk.iter().copied()),
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;
        for row in rows {
            let (token, id) = row?;
            // Map back through the key set to keep borrowed keys.
            if let Some((&word, _)) = stems.get_key_value(token.as_str()) {
                ids.insert(word, id);
            }
        }
    }

    {
        let mut insert = tx.prepare("INSERT INTO tokens (token, stem) VALUES (?1, ?2)")?;
        for (&word, &stem) in stems {
            if !ids.contains_key(word) {
                insert.execute(params![word, stem])?;
                ids.insert(word, tx.last_insert_rowid());
            }
        }
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::parser::parse_document;
    use crate::stemmer::Stemmer;
    use chrono::NaiveDate;

    fn meta(num: i64) -> DocumentMeta {
        DocumentMeta {
            num,
            title: format!("Document {}", num),
            published_at: NaiveDate::from_ymd_opt(1981, 9, 1).unwrap(),
            authors: vec!["J. Postel".to_string()],
        }
    }

    fn ingest(db: &Database, meta: &DocumentMeta, text: &str) -> CorpusResult<()> {
        let stemmer = Stemmer::new();
        let parsed = parse_document(text, &stemmer);
        let conn = db.get_conn().unwrap();
        let tx = conn.unchecked_transaction().unwrap();
        write_document(&tx, meta, &parsed)?;
        tx.commit().unwrap();
        Ok(())
    }

    #[test]
    fn test_abs_index_follows_reading_order() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &meta(1), "alpha beta\ngamma\n\ndelta epsilon\n").unwrap();

        let conn = db.get_conn().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT t.token, tp.abs_index
                 FROM token_positions tp
                 JOIN tokens t ON t.id = tp.token_id
                 JOIN lines l ON l.id = tp.line_id
                 JOIN sections s ON s.id = l.section_id
                 ORDER BY s.section_index, l.line_number, tp.word_index",
            )
            .unwrap();
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        let expected = ["alpha", "beta", "gamma", "delta", "epsilon"];
        assert_eq!(rows.len(), expected.len());
        for (i, (word, abs)) in rows.iter().enumerate() {
            assert_eq!(word, expected[i]);
            assert_eq!(*abs, i as i64);
        }
    }

    #[test]
    fn test_counts_aggregate_per_token() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &meta(1), "ping pong ping\nping\n").unwrap();

        let conn = db.get_conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT c.total_positions FROM document_token_counts c
                 JOIN tokens t ON t.id = c.token_id WHERE t.token = 'ping'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_dictionary_is_shared_across_documents() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &meta(1), "shared word\n").unwrap();
        ingest(&db, &meta(2), "shared again\n").unwrap();

        let conn = db.get_conn().unwrap();
        let tokens: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tokens WHERE token = 'shared'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tokens, 1);
    }

    #[test]
    fn test_duplicate_document_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &meta(7), "first copy\n").unwrap();
        let err = ingest(&db, &meta(7), "second copy\n").unwrap_err();
        assert!(matches!(err, CorpusError::DuplicateDocument(7)));
    }

    #[test]
    fn test_rejects_missing_metadata() {
        let db = Database::open_in_memory().unwrap();
        let mut bad = meta(1);
        bad.title = "   ".into();
        assert!(matches!(
            ingest(&db, &bad, "text\n").unwrap_err(),
            CorpusError::Validation(_)
        ));

        let mut no_authors = meta(2);
        no_authors.authors.clear();
        assert!(matches!(
            ingest(&db, &no_authors, "text\n").unwrap_err(),
            CorpusError::Validation(_)
        ));
    }

    #[test]
    fn test_failed_ingest_leaves_no_partial_rows() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &meta(3), "already here\n").unwrap();

        // Duplicate fails after validation; nothing new may persist.
        let before: i64 = {
            let conn = db.get_conn().unwrap();
            conn.query_row("SELECT COUNT(*) FROM token_positions", [], |row| row.get(0))
                .unwrap()
        };
        assert!(ingest(&db, &meta(3), "something else entirely\n").is_err());
        let after: i64 = {
            let conn = db.get_conn().unwrap();
            conn.query_row("SELECT COUNT(*) FROM token_positions", [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(before, after);
    }
}
