//! SQLite storage layer for the corpus index.
//!
//! Normalized schema: documents own sections own lines own token positions;
//! the token dictionary is corpus-wide and shared. Uses r2d2 connection
//! pooling so reads proceed concurrently; WAL mode keeps readers from
//! blocking each other. Every mutating operation runs inside a single
//! transaction opened on one pooled connection.

use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Parse an ISO date column written by ingestion. Dates are always written
/// with `%Y-%m-%d`, so a parse failure means a corrupted row.
pub(crate) fn parse_db_date(date_str: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

/// Thread-safe handle to the corpus database.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA foreign_keys=ON;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (tests, ephemeral corpora).
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            Ok(())
        });

        // In-memory databases exist per connection; a single pooled
        // connection keeps all state in one place.
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                num INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                published_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS authors (
                doc_num INTEGER NOT NULL REFERENCES documents(num) ON DELETE CASCADE,
                name TEXT NOT NULL,
                PRIMARY KEY (doc_num, name)
            );

            CREATE TABLE IF NOT EXISTS sections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_num INTEGER NOT NULL REFERENCES documents(num) ON DELETE CASCADE,
                section_index INTEGER NOT NULL,
                page INTEGER NOT NULL,
                row_start INTEGER NOT NULL,
                row_end INTEGER NOT NULL,
                indentation INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                section_id INTEGER NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
                line_number INTEGER NOT NULL,
                abs_line_number INTEGER NOT NULL,
                indentation INTEGER NOT NULL,
                text TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL UNIQUE,
                stem TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS token_positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_id INTEGER NOT NULL REFERENCES tokens(id) ON DELETE CASCADE,
                line_id INTEGER NOT NULL REFERENCES lines(id) ON DELETE CASCADE,
                start_position INTEGER NOT NULL,
                end_position INTEGER NOT NULL,
                word_index INTEGER NOT NULL,
                abs_index INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS document_token_counts (
                doc_num INTEGER NOT NULL REFERENCES documents(num) ON DELETE CASCADE,
                token_id INTEGER NOT NULL REFERENCES tokens(id) ON DELETE CASCADE,
                total_positions INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (doc_num, token_id)
            );

            CREATE TABLE IF NOT EXISTS token_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS token_group_members (
                token_id INTEGER NOT NULL REFERENCES tokens(id) ON DELETE CASCADE,
                group_id INTEGER NOT NULL REFERENCES token_groups(id) ON DELETE CASCADE,
                PRIMARY KEY (token_id, group_id)
            );

            CREATE TABLE IF NOT EXISTS phrases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phrase_name TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS phrase_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phrase_id INTEGER NOT NULL REFERENCES phrases(id) ON DELETE CASCADE,
                token_id INTEGER NOT NULL REFERENCES tokens(id),
                word_index INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_published ON documents(published_at);
            CREATE INDEX IF NOT EXISTS idx_sections_doc ON sections(doc_num);
            CREATE INDEX IF NOT EXISTS idx_lines_section ON lines(section_id);
            CREATE INDEX IF NOT EXISTS idx_lines_abs ON lines(abs_line_number);
            CREATE INDEX IF NOT EXISTS idx_tokens_stem ON tokens(stem);
            CREATE INDEX IF NOT EXISTS idx_positions_token ON token_positions(token_id);
            CREATE INDEX IF NOT EXISTS idx_positions_line ON token_positions(line_id);
            CREATE INDEX IF NOT EXISTS idx_counts_token ON document_token_counts(token_id);
        "#,
        )?;

        Ok(())
    }

    /// Whether a document with this number is already ingested.
    pub fn document_exists(&self, num: i64) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE num = ?1",
            [num],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Total number of ingested documents.
    pub fn count_documents(&self) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get the database size in bytes.
    pub fn database_size(&self) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(page_count * page_size)
    }
}
