//! Exact phrase search and named-phrase management.
//!
//! Phrase matching slides a window of N token occurrences per (document,
//! section), ordered by `abs_index`, and accepts a window only when the
//! surface forms match the phrase case-insensitively AND the window's
//! abs_index span is exactly N-1. The span check is what makes matches
//! contiguous: any intervening token in the document stream widens the span
//! and kills the window, including runs that merely straddle a gap.

use rusqlite::{params, Connection, Transaction};
use tracing::debug;

use crate::interface::{CorpusError, CorpusResult, PhraseOccurrence};
use crate::parser::tokenize_words;

struct CandidateRow {
    doc_num: i64,
    section_index: i64,
    abs_line: i64,
    indentation: i64,
    word: String,
    start_position: i64,
    abs_index: i64,
}

/// Find every occurrence of a literal phrase across the corpus.
pub(crate) fn find_phrase(
    conn: &Connection,
    phrase_text: &str,
) -> CorpusResult<Vec<PhraseOccurrence>> {
    let words = phrase_words(phrase_text)?;
    let n = words.len();

    // Only positions whose token is one of the phrase words can participate
    // in a match; any other token between them widens the abs_index span and
    // fails the contiguity check anyway.
    let mut distinct = words.clone();
    distinct.sort();
    distinct.dedup();
    let placeholders = distinct.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT d.num, s.section_index, l.abs_line_number, l.indentation,
                t.token, tp.start_position, tp.abs_index
         FROM token_positions tp
         JOIN tokens t ON t.id = tp.token_id
         JOIN lines l ON l.id = tp.line_id
         JOIN sections s ON s.id = l.section_id
         JOIN documents d ON d.num = s.doc_num
         WHERE LOWER(t.token) IN ({})
         ORDER BY d.num, tp.abs_index",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<CandidateRow> = stmt
        .query_map(rusqlite::params_from_iter(distinct.iter()), |row| {
            Ok(CandidateRow {
                doc_num: row.get(0)?,
                section_index: row.get(1)?,
                abs_line: row.get(2)?,
                indentation: row.get(3)?,
                word: row.get(4)?,
                start_position: row.get(5)?,
                abs_index: row.get(6)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut occurrences = Vec::new();
    for window in rows.windows(n) {
        let first = &window[0];
        let last = &window[n - 1];

        // Contiguous in the document's token stream, inside one section.
        if last.abs_index - first.abs_index != (n as i64) - 1 {
            continue;
        }
        if window
            .iter()
            .any(|r| r.doc_num != first.doc_num || r.section_index != first.section_index)
        {
            continue;
        }
        if !window
            .iter()
            .zip(&words)
            .all(|(row, word)| row.word.to_lowercase() == *word)
        {
            continue;
        }

        occurrences.push(PhraseOccurrence {
            doc_num: first.doc_num,
            section_index: first.section_index,
            abs_line: first.abs_line,
            start_offset: first.start_position,
            column: first.indentation + first.start_position,
        });
    }

    debug!(phrase = phrase_text, matches = occurrences.len(), "phrase search");
    Ok(occurrences)
}

/// Store a named phrase. Every word must already exist in the token
/// dictionary; nothing is auto-created here.
pub(crate) fn save_phrase(tx: &Transaction, name: &str, text: &str) -> CorpusResult<()> {
    if name.trim().is_empty() {
        return Err(CorpusError::Validation("phrase name must not be empty".into()));
    }
    let words = phrase_words(text)?;

    let exists: i64 = tx.query_row(
        "SELECT COUNT(*) FROM phrases WHERE phrase_name = ?1",
        [name],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Err(CorpusError::DuplicatePhrase(name.to_string()));
    }

    let mut token_ids = Vec::with_capacity(words.len());
    {
        let mut lookup = tx.prepare(
            "SELECT id FROM tokens WHERE LOWER(token) = ?1 ORDER BY id LIMIT 1",
        )?;
        for word in &words {
            let id: Option<i64> = lookup
                .query_row([word], |row| row.get(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            match id {
                Some(id) => token_ids.push(id),
                None => return Err(CorpusError::UnknownWord(word.clone())),
            }
        }
    }

    tx.execute(
        "INSERT INTO phrases (phrase_name, content) VALUES (?1, ?2)",
        params![name, text],
    )?;
    let phrase_id = tx.last_insert_rowid();
    let mut insert = tx.prepare(
        "INSERT INTO phrase_tokens (phrase_id, token_id, word_index) VALUES (?1, ?2, ?3)",
    )?;
    for (index, token_id) in token_ids.iter().enumerate() {
        insert.execute(params![phrase_id, token_id, index as i64])?;
    }

    Ok(())
}

/// Resolve a saved phrase by name and search for its literal content.
pub(crate) fn phrase_occurrences(
    conn: &Connection,
    name: &str,
) -> CorpusResult<Vec<PhraseOccurrence>> {
    let content: Option<String> = conn
        .query_row(
            "SELECT content FROM phrases WHERE phrase_name = ?1",
            [name],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match content {
        Some(content) => find_phrase(conn, &content),
        None => Err(CorpusError::NotFound(format!("phrase '{}'", name))),
    }
}

/// List saved phrase names.
pub(crate) fn list_phrases(conn: &Connection) -> CorpusResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT phrase_name FROM phrases ORDER BY phrase_name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(names)
}

fn phrase_words(text: &str) -> CorpusResult<Vec<String>> {
    let words: Vec<String> = tokenize_words(text)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect();
    if words.is_empty() {
        return Err(CorpusError::Validation("phrase text must contain at least one word".into()));
    }
    Ok(words)
}
