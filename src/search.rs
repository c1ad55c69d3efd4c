//! Ranked document search.
//!
//! Metadata filters (number, title substring, authors, date range) narrow
//! the candidate set in SQL; when query tokens are present the candidates
//! are scored with TF-IDF over stems, using the per-document token counts
//! maintained at ingestion (no position scan at query time).

use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::debug;

use crate::database::parse_db_date;
use crate::interface::{CorpusResult, DocumentMatch, DocumentMeta, SearchQuery};
use crate::stemmer::Stemmer;

pub(crate) fn search_documents(
    conn: &Connection,
    stemmer: &Stemmer,
    query: &SearchQuery,
) -> CorpusResult<Vec<DocumentMatch>> {
    let mut sql = String::from(
        "SELECT num, title, published_at FROM documents WHERE 1=1",
    );
    let mut params: Vec<Value> = Vec::new();

    if let Some(num) = query.num {
        sql.push_str(" AND num = ?");
        params.push(Value::from(num));
    }
    if let Some(title) = &query.title {
        sql.push_str(" AND LOWER(title) LIKE ? ESCAPE '\\'");
        params.push(Value::from(like_pattern(title)));
    }
    if let Some((start, end)) = &query.date_range {
        sql.push_str(" AND published_at BETWEEN ? AND ?");
        params.push(Value::from(start.format("%Y-%m-%d").to_string()));
        params.push(Value::from(end.format("%Y-%m-%d").to_string()));
    }
    if let Some(authors) = &query.authors {
        // Logical AND across distinct filter authors: each must
        // substring-match at least one recorded author.
        for author in authors {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM authors a
                              WHERE a.doc_num = documents.num
                                AND LOWER(a.name) LIKE ? ESCAPE '\\')",
            );
            params.push(Value::from(like_pattern(author)));
        }
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut candidates: Vec<DocumentMeta> = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            let published: String = row.get(2)?;
            Ok(DocumentMeta {
                num: row.get(0)?,
                title: row.get(1)?,
                published_at: parse_db_date(&published)?,
                authors: Vec::new(),
            })
        })?
        .collect::<Result<_, _>>()?;

    attach_authors(conn, &mut candidates)?;

    let tokens = query.tokens.as_deref().unwrap_or(&[]);
    let results = if tokens.is_empty() {
        // No tokens: newest first, document number breaks ties.
        candidates.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then(a.num.cmp(&b.num))
        });
        candidates
            .into_iter()
            .map(|meta| DocumentMatch { meta, rank: None })
            .collect()
    } else {
        let scores = tfidf_scores(conn, stemmer, tokens)?;
        let mut scored: Vec<DocumentMatch> = candidates
            .into_iter()
            .filter_map(|meta| {
                scores.get(&meta.num).map(|&score| DocumentMatch {
                    meta,
                    rank: Some(score),
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.rank
                .unwrap_or(0.0)
                .total_cmp(&a.rank.unwrap_or(0.0))
                .then(a.meta.num.cmp(&b.meta.num))
        });
        scored
    };

    debug!(results = results.len(), "document search");
    Ok(results)
}

/// TF-IDF score per document for the given query tokens.
///
/// score(doc) = sum over matched stems of tf(doc, stem) * ln(N / df(stem)),
/// with tf read from the per-document count table, df = number of distinct
/// documents containing the stem, N = corpus size. Documents matching none
/// of the stems are absent from the map.
fn tfidf_scores(
    conn: &Connection,
    stemmer: &Stemmer,
    tokens: &[String],
) -> CorpusResult<HashMap<i64, f64>> {
    let mut stems: Vec<String> = tokens.iter().map(|t| stemmer.stem(t)).collect();
    stems.sort();
    stems.dedup();
    if stems.is_empty() {
        return Ok(HashMap::new());
    }

    let total_docs: i64 =
        conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
    if total_docs == 0 {
        return Ok(HashMap::new());
    }

    let placeholders = stems.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT t.stem, c.doc_num, SUM(c.total_positions)
         FROM document_token_counts c
         JOIN tokens t ON t.id = c.token_id
         WHERE t.stem IN ({})
         GROUP BY t.stem, c.doc_num",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<(String, i64, i64)> = stmt
        .query_map(rusqlite::params_from_iter(stems.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<_, _>>()?;

    let mut doc_freq: HashMap<&str, i64> = HashMap::new();
    for (stem, _, _) in &rows {
        *doc_freq.entry(stem.as_str()).or_insert(0) += 1;
    }

    let mut scores: HashMap<i64, f64> = HashMap::new();
    for (stem, doc_num, tf) in &rows {
        let df = doc_freq[stem.as_str()];
        let idf = ((total_docs as f64) / (df as f64)).ln();
        *scores.entry(*doc_num).or_insert(0.0) += (*tf as f64) * idf;
    }

    Ok(scores)
}

fn attach_authors(conn: &Connection, docs: &mut [DocumentMeta]) -> CorpusResult<()> {
    if docs.is_empty() {
        return Ok(());
    }
    let mut by_num: HashMap<i64, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT doc_num, name FROM authors ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (num, name) = row?;
        by_num.entry(num).or_default().push(name);
    }
    for doc in docs {
        if let Some(authors) = by_num.remove(&doc.num) {
            doc.authors = authors;
        }
    }
    Ok(())
}

/// Case-insensitive substring pattern with LIKE wildcards escaped out of
/// the user's input.
pub(crate) fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
