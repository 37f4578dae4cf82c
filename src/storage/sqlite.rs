//! SQLite implementation of [`DocumentStore`]

use crate::record::TenderRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DocumentStore, InsertReport, StorageResult};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite document store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl DocumentStore for SqliteStore {
    fn clear(&mut self, collection: &str) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![collection],
        )?;
        Ok(removed)
    }

    fn insert_many(
        &mut self,
        collection: &str,
        records: &[TenderRecord],
    ) -> StorageResult<InsertReport> {
        let tx = self.conn.transaction()?;
        let mut report = InsertReport::default();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (collection, identity_key, scraped_at, body)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for record in records {
                let body = match record.to_document() {
                    Ok(document) => document.to_string(),
                    Err(e) => {
                        report
                            .failures
                            .push(format!("{}: serialization failed: {}", record.identity_key, e));
                        continue;
                    }
                };

                match stmt.execute(params![
                    collection,
                    record.identity_key,
                    record.scraped_at.to_rfc3339(),
                    body
                ]) {
                    Ok(_) => report.inserted += 1,
                    Err(e) => report
                        .failures
                        .push(format!("{}: {}", record.identity_key, e)),
                }
            }
        }

        tx.commit()?;
        Ok(report)
    }

    fn count(&self, collection: &str) -> StorageResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn list(&self, collection: &str) -> StorageResult<Vec<serde_json::Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")?;

        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut documents = Vec::with_capacity(bodies.len());
        for body in bodies {
            documents.push(serde_json::from_str(&body)?);
        }
        Ok(documents)
    }

    fn collections(&self) -> StorageResult<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
        )?;

        let collections = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(collections)
    }
}
