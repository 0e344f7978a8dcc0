//! Relational backing store for question/answer records.
//!
//! The backing store is the source of truth for record contents; vector
//! indices are a derived projection of it.

use crate::types::{InsertOutcome, QaRecord, RecordId};
use qabase_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// CRUD operations the index layer needs from the record store.
pub trait QaRepository: Send + Sync {
    /// Every record, ordered by id.
    fn fetch_all_records(&self) -> AppResult<Vec<QaRecord>>;

    fn fetch_record_by_id(&self, id: RecordId) -> AppResult<Option<QaRecord>>;

    fn insert_record(
        &self,
        question: &str,
        answer: &str,
        index_name: &str,
    ) -> AppResult<InsertOutcome>;

    /// Returns the number of rows affected.
    fn update_record(&self, id: RecordId, question: &str, answer: &str) -> AppResult<usize>;

    /// Returns the number of rows affected.
    fn delete_record(&self, id: RecordId) -> AppResult<usize>;

    /// Index names known to the catalog, sorted.
    fn fetch_index_catalog(&self) -> AppResult<Vec<String>>;

    /// Record `name` in the catalog if it is not there yet.
    fn ensure_catalog_entry(&self, name: &str) -> AppResult<()>;
}

/// SQLite implementation of [`QaRepository`].
#[derive(Debug)]
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::BackingStore(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::BackingStore(format!("Failed to open SQLite database: {}", e)))?;

        let repo = Self::with_connection(conn)?;
        tracing::debug!("Opened backing store at {:?}", db_path);
        Ok(repo)
    }

    /// A private in-memory database, used by tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AppError::BackingStore(format!("Failed to open in-memory database: {}", e))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS qapair (
                qa_id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                vec_index_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_tb (
                index_id INTEGER PRIMARY KEY AUTOINCREMENT,
                index_name TEXT NOT NULL UNIQUE
            );

            CREATE INDEX IF NOT EXISTS idx_qapair_index ON qapair(vec_index_name);
            "#,
        )
        .map_err(|e| AppError::BackingStore(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::BackingStore("Database connection lock poisoned".to_string()))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<QaRecord> {
    Ok(QaRecord {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        index_name: row.get(3)?,
    })
}

impl QaRepository for SqliteRepository {
    fn fetch_all_records(&self) -> AppResult<Vec<QaRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT qa_id, question, answer, vec_index_name FROM qapair ORDER BY qa_id")
            .map_err(|e| AppError::BackingStore(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map([], row_to_record)
            .map_err(|e| AppError::BackingStore(format!("Failed to fetch records: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::BackingStore(format!("Failed to read record: {}", e)))?;

        tracing::debug!("Fetched {} records", records.len());
        Ok(records)
    }

    fn fetch_record_by_id(&self, id: RecordId) -> AppResult<Option<QaRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT qa_id, question, answer, vec_index_name FROM qapair WHERE qa_id = ?1",
            params![id],
            row_to_record,
        )
        .optional()
        .map_err(|e| AppError::BackingStore(format!("Failed to fetch record {}: {}", id, e)))
    }

    fn insert_record(
        &self,
        question: &str,
        answer: &str,
        index_name: &str,
    ) -> AppResult<InsertOutcome> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                "INSERT INTO qapair (question, answer, vec_index_name) VALUES (?1, ?2, ?3)",
                params![question, answer, index_name],
            )
            .map_err(|e| AppError::BackingStore(format!("Failed to insert record: {}", e)))?;

        Ok(InsertOutcome {
            rows_affected,
            id: conn.last_insert_rowid(),
        })
    }

    fn update_record(&self, id: RecordId, question: &str, answer: &str) -> AppResult<usize> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE qapair SET question = ?1, answer = ?2 WHERE qa_id = ?3",
            params![question, answer, id],
        )
        .map_err(|e| AppError::BackingStore(format!("Failed to update record {}: {}", id, e)))
    }

    fn delete_record(&self, id: RecordId) -> AppResult<usize> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM qapair WHERE qa_id = ?1", params![id])
            .map_err(|e| AppError::BackingStore(format!("Failed to delete record {}: {}", id, e)))
    }

    fn fetch_index_catalog(&self) -> AppResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT index_name FROM index_tb ORDER BY index_name")
            .map_err(|e| AppError::BackingStore(format!("Failed to prepare query: {}", e)))?;

        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| AppError::BackingStore(format!("Failed to fetch index catalog: {}", e)))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| AppError::BackingStore(format!("Failed to read catalog entry: {}", e)))?;

        Ok(names)
    }

    fn ensure_catalog_entry(&self, name: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO index_tb (index_name) VALUES (?1)",
            params![name],
        )
        .map_err(|e| {
            AppError::BackingStore(format!("Failed to record index '{}' in catalog: {}", name, e))
        })?;
        Ok(())
    }
}
