//! Database schema for the document store

/// SQL schema for the database
///
/// Every source owns one logical collection. Documents are keyed by
/// `(collection, identity_key)` and carry their full JSON body.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    identity_key TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    body TEXT NOT NULL,
    UNIQUE(collection, identity_key)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
