//! Faceted word index and occurrence drill-down.
//!
//! The index view aggregates the per-document token counts (never the raw
//! position table), filters by group membership / document title / partial
//! substring, and paginates. Drill-down goes token -> per-document counts
//! -> individual occurrences with full coordinates.

use rusqlite::types::Value;
use rusqlite::{params, Connection};

use crate::interface::{
    CorpusResult, DocumentOccurrences, LineContext, Paginated, RelativePosition,
    SortBy, SortOrder, TokenOccurrence, WordEntry, WordQuery,
};
use crate::render::to_highlight;
use crate::search::like_pattern;

/// Page through the word index under the query's filters.
pub(crate) fn query_words(
    conn: &Connection,
    query: &WordQuery,
) -> CorpusResult<Paginated<WordEntry>> {
    let mut sql = String::from(
        "SELECT t.token, t.stem, SUM(c.total_positions) AS occurrences
         FROM tokens t
         JOIN document_token_counts c ON c.token_id = t.id
         JOIN documents d ON d.num = c.doc_num
         WHERE 1=1",
    );
    let mut params: Vec<Value> = Vec::new();

    if let Some(groups) = &query.groups {
        let placeholders = groups.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        sql.push_str(&format!(
            " AND t.id IN (SELECT m.token_id
                           FROM token_group_members m
                           JOIN token_groups g ON g.id = m.group_id
                           WHERE g.group_name IN ({}))",
            placeholders
        ));
        for group in groups {
            params.push(Value::from(group.clone()));
        }
    }
    if let Some(title) = &query.title {
        sql.push_str(" AND LOWER(d.title) LIKE ? ESCAPE '\\'");
        params.push(Value::from(like_pattern(title)));
    }
    if let Some(partial) = &query.partial {
        sql.push_str(
            " AND (LOWER(t.token) LIKE ? ESCAPE '\\'
               OR LOWER(t.stem) LIKE ? ESCAPE '\\')",
        );
        let pattern = like_pattern(partial);
        params.push(Value::from(pattern.clone()));
        params.push(Value::from(pattern));
    }

    sql.push_str(" GROUP BY t.id");

    let total_count: i64 = {
        let count_sql = format!("SELECT COUNT(*) FROM ({})", sql);
        conn.query_row(
            &count_sql,
            rusqlite::params_from_iter(params.iter().cloned()),
            |row| row.get(0),
        )?
    };

    let direction = match query.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    match query.sort_by {
        SortBy::Alphabetical => {
            sql.push_str(&format!(" ORDER BY t.stem {0}, t.token {0}", direction));
        }
        SortBy::Occurrences => {
            sql.push_str(&format!(" ORDER BY occurrences {}, t.token ASC", direction));
        }
    }

    let page = query.page.max(1);
    let page_size = if query.page_size > 0 { query.page_size } else { 100 };
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::from(page_size));
    params.push(Value::from((page - 1) * page_size));

    let mut stmt = conn.prepare(&sql)?;
    let results = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(WordEntry {
                token: row.get(0)?,
                stem: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    Ok(Paginated::new(results, total_count, page_size))
}

/// Per-document occurrence totals for one surface form.
pub(crate) fn document_occurrences(
    conn: &Connection,
    token: &str,
    title: Option<&str>,
) -> CorpusResult<Vec<DocumentOccurrences>> {
    let mut sql = String::from(
        "SELECT d.num, d.title, SUM(c.total_positions)
         FROM document_token_counts c
         JOIN tokens t ON t.id = c.token_id
         JOIN documents d ON d.num = c.doc_num
         WHERE t.token = ?",
    );
    let mut params: Vec<Value> = vec![Value::from(token.to_string())];

    if let Some(title) = title {
        sql.push_str(" AND LOWER(d.title) LIKE ? ESCAPE '\\'");
        params.push(Value::from(like_pattern(title)));
    }
    sql.push_str(" GROUP BY d.num, d.title ORDER BY d.num");

    let mut stmt = conn.prepare(&sql)?;
    let results = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(DocumentOccurrences {
                num: row.get(0)?,
                title: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(results)
}

/// Every occurrence of one surface form within one document, in reading
/// order, with full coordinates and the owning line's text for excerpts.
pub(crate) fn occurrences(
    conn: &Connection,
    token: &str,
    doc_num: i64,
) -> CorpusResult<Vec<TokenOccurrence>> {
    let mut stmt = conn.prepare(
        "SELECT s.page, l.abs_line_number, l.indentation,
                s.section_index, s.row_start, l.line_number,
                tp.start_position, tp.end_position, tp.word_index, l.text
         FROM token_positions tp
         JOIN tokens t ON t.id = tp.token_id
         JOIN lines l ON l.id = tp.line_id
         JOIN sections s ON s.id = l.section_id
         WHERE t.token = ?1 AND s.doc_num = ?2
         ORDER BY tp.abs_index",
    )?;

    let results = stmt
        .query_map(params![token, doc_num], |row| {
            let page: i64 = row.get(0)?;
            let abs_line: i64 = row.get(1)?;
            let indentation: i64 = row.get(2)?;
            let section_index: i64 = row.get(3)?;
            let row_start: i64 = row.get(4)?;
            let line_number: i64 = row.get(5)?;
            let start: i64 = row.get(6)?;
            let end: i64 = row.get(7)?;
            let word_index: i64 = row.get(8)?;
            let text: String = row.get(9)?;

            Ok(TokenOccurrence {
                page,
                abs: to_highlight(abs_line, indentation, start, end),
                rel: RelativePosition {
                    section: section_index,
                    line: row_start + line_number,
                    word: word_index,
                },
                context: LineContext { content: text, start, end },
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(results)
}
