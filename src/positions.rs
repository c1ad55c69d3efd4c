//! Coordinate-based token lookups.
//!
//! Two independent modes: absolute (document line / character column) and
//! relative (section / line-in-section / word-in-line). Both paginate and
//! report totals that are invariant under page changes for the same filter.

use rusqlite::types::Value;
use rusqlite::Connection;

use crate::interface::{AbsoluteQuery, CorpusResult, Paginated, PositionHit, RelativeQuery};
use crate::search::like_pattern;

const DEFAULT_PAGE_SIZE: i64 = 50;

/// Tokens whose occupied column range contains the given column on the
/// given absolute line (or all tokens on the line if no column is given).
pub(crate) fn absolute_search(
    conn: &Connection,
    query: &AbsoluteQuery,
) -> CorpusResult<Paginated<PositionHit>> {
    let mut sql = String::from(
        "SELECT d.num, l.abs_line_number, t.token, t.stem,
                tp.start_position, l.indentation
         FROM token_positions tp
         JOIN tokens t ON t.id = tp.token_id
         JOIN lines l ON l.id = tp.line_id
         JOIN sections s ON s.id = l.section_id
         JOIN documents d ON d.num = s.doc_num
         WHERE 1=1",
    );
    let mut params: Vec<Value> = Vec::new();

    if let Some(title) = &query.title {
        sql.push_str(" AND LOWER(d.title) LIKE ? ESCAPE '\\'");
        params.push(Value::from(like_pattern(title)));
    }
    if let Some(abs_line) = query.abs_line {
        sql.push_str(" AND l.abs_line_number = ?");
        params.push(Value::from(abs_line));
    }
    if let Some(column) = query.column {
        // Occupied range is [indentation + start, indentation + end).
        sql.push_str(
            " AND (l.indentation + tp.start_position) <= ?
              AND (l.indentation + tp.end_position) > ?",
        );
        params.push(Value::from(column));
        params.push(Value::from(column));
    }

    sql.push_str(
        " ORDER BY d.num, l.abs_line_number, (l.indentation + tp.start_position)",
    );

    let (page, page_size) = normalize_paging(query.page, query.page_size);
    let total_count = count_results(conn, &sql, &params)?;

    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::from(page_size));
    params.push(Value::from((page - 1) * page_size));

    let mut stmt = conn.prepare(&sql)?;
    let results = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            let abs_line: i64 = row.get(1)?;
            let start: i64 = row.get(4)?;
            let indentation: i64 = row.get(5)?;
            Ok(PositionHit {
                doc_num: row.get(0)?,
                abs_line,
                word: row.get(2)?,
                stem: row.get(3)?,
                context: format!("Line {}, Start Column {}", abs_line, indentation + start),
            })
        })?
        .collect::<Result<_, _>>()?;

    Ok(Paginated::new(results, total_count, page_size))
}

/// Tokens at a section-relative coordinate.
pub(crate) fn relative_search(
    conn: &Connection,
    query: &RelativeQuery,
) -> CorpusResult<Paginated<PositionHit>> {
    let mut sql = String::from(
        "SELECT d.num, l.abs_line_number, t.token, t.stem,
                s.section_index, l.line_number, tp.word_index
         FROM token_positions tp
         JOIN tokens t ON t.id = tp.token_id
         JOIN lines l ON l.id = tp.line_id
         JOIN sections s ON s.id = l.section_id
         JOIN documents d ON d.num = s.doc_num
         WHERE 1=1",
    );
    let mut params: Vec<Value> = Vec::new();

    if let Some(title) = &query.title {
        sql.push_str(" AND LOWER(d.title) LIKE ? ESCAPE '\\'");
        params.push(Value::from(like_pattern(title)));
    }
    if let Some(section) = query.section {
        sql.push_str(" AND s.section_index = ?");
        params.push(Value::from(section));
    }
    if let Some(line) = query.line_in_section {
        sql.push_str(" AND l.line_number = ?");
        params.push(Value::from(line));
    }
    if let Some(word) = query.word_in_line {
        sql.push_str(" AND tp.word_index = ?");
        params.push(Value::from(word));
    }

    sql.push_str(" ORDER BY d.num, s.section_index, l.line_number, tp.word_index");

    let (page, page_size) = normalize_paging(query.page, query.page_size);
    let total_count = count_results(conn, &sql, &params)?;

    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::from(page_size));
    params.push(Value::from((page - 1) * page_size));

    let mut stmt = conn.prepare(&sql)?;
    let results = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            let section: i64 = row.get(4)?;
            let line: i64 = row.get(5)?;
            let word_index: i64 = row.get(6)?;
            Ok(PositionHit {
                doc_num: row.get(0)?,
                abs_line: row.get(1)?,
                word: row.get(2)?,
                stem: row.get(3)?,
                context: format!("Section {}, Line {}, Word {}", section, line, word_index),
            })
        })?
        .collect::<Result<_, _>>()?;

    Ok(Paginated::new(results, total_count, page_size))
}

fn count_results(conn: &Connection, base_sql: &str, params: &[Value]) -> CorpusResult<i64> {
    let count_sql = format!("SELECT COUNT(*) FROM ({})", base_sql);
    let count = conn.query_row(
        &count_sql,
        rusqlite::params_from_iter(params.iter().cloned()),
        |row| row.get(0),
    )?;
    Ok(count)
}

fn normalize_paging(page: i64, page_size: i64) -> (i64, i64) {
    let page = page.max(1);
    let page_size = if page_size > 0 { page_size } else { DEFAULT_PAGE_SIZE };
    (page, page_size)
}
