//! Named token-group management.
//!
//! Groups reference tokens, never own them: adding a word that has no token
//! yet creates the token (with its stem) before linking; removing a word
//! only unlinks the membership. Membership is idempotent.

use rusqlite::{params, Connection, Transaction};

use crate::interface::{CorpusError, CorpusResult};
use crate::stemmer::Stemmer;

pub(crate) fn create_group(
    tx: &Transaction,
    stemmer: &Stemmer,
    name: &str,
    words: &[String],
) -> CorpusResult<()> {
    if name.trim().is_empty() {
        return Err(CorpusError::Validation("group name must not be empty".into()));
    }
    let exists: i64 = tx.query_row(
        "SELECT COUNT(*) FROM token_groups WHERE group_name = ?1",
        [name],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Err(CorpusError::DuplicateGroup(name.to_string()));
    }

    tx.execute("INSERT INTO token_groups (group_name) VALUES (?1)", [name])?;
    let group_id = tx.last_insert_rowid();

    link_words(tx, stemmer, group_id, words)
}

pub(crate) fn add_words(
    tx: &Transaction,
    stemmer: &Stemmer,
    name: &str,
    words: &[String],
) -> CorpusResult<()> {
    let group_id = group_id(tx, name)?;
    link_words(tx, stemmer, group_id, words)
}

pub(crate) fn remove_words(
    tx: &Transaction,
    name: &str,
    words: &[String],
) -> CorpusResult<()> {
    let id = group_id(tx, name)?;
    if words.is_empty() {
        return Ok(());
    }

    let placeholders = words.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "DELETE FROM token_group_members
         WHERE group_id = ?
           AND token_id IN (SELECT id FROM tokens WHERE token IN ({}))",
        placeholders
    );
    let mut params: Vec<rusqlite::types::Value> = vec![rusqlite::types::Value::from(id)];
    for word in words {
        params.push(rusqlite::types::Value::from(word.clone()));
    }
    // Removing a non-member word matches no rows, which is fine.
    tx.execute(&sql, rusqlite::params_from_iter(params))?;
    Ok(())
}

pub(crate) fn list_groups(conn: &Connection) -> CorpusResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT group_name FROM token_groups ORDER BY group_name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(names)
}

pub(crate) fn list_words(conn: &Connection, name: &str) -> CorpusResult<Vec<String>> {
    let id = group_id(conn, name)?;
    let mut stmt = conn.prepare(
        "SELECT t.token FROM tokens t
         JOIN token_group_members m ON m.token_id = t.id
         WHERE m.group_id = ?1
         ORDER BY t.token",
    )?;
    let words = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(words)
}

fn link_words(
    tx: &Transaction,
    stemmer: &Stemmer,
    group_id: i64,
    words: &[String],
) -> CorpusResult<()> {
    for word in words {
        if word.trim().is_empty() {
            return Err(CorpusError::Validation("group words must not be empty".into()));
        }
        let token_id = get_or_create_token(tx, stemmer, word)?;
        // INSERT OR IGNORE keeps membership idempotent.
        tx.execute(
            "INSERT OR IGNORE INTO token_group_members (token_id, group_id) VALUES (?1, ?2)",
            params![token_id, group_id],
        )?;
    }
    Ok(())
}

fn get_or_create_token(tx: &Transaction, stemmer: &Stemmer, word: &str) -> CorpusResult<i64> {
    let existing: Option<i64> = tx
        .query_row("SELECT id FROM tokens WHERE token = ?1", [word], |row| row.get(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute(
        "INSERT INTO tokens (token, stem) VALUES (?1, ?2)",
        params![word, stemmer.stem(word)],
    )?;
    Ok(tx.last_insert_rowid())
}

fn group_id(conn: &Connection, name: &str) -> CorpusResult<i64> {
    conn.query_row(
        "SELECT id FROM token_groups WHERE group_name = ?1",
        [name],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            CorpusError::NotFound(format!("group '{}'", name))
        }
        other => other.into(),
    })
}
