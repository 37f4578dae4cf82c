//! Storage traits and error types

use crate::record::TenderRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unsupported connection string: {0}")]
    UnsupportedConnection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a bulk insert
///
/// A bulk insert does not stop at the first bad document; every failure is
/// recorded so a partial write is observable to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: usize,
    pub failures: Vec<String>,
}

impl InsertReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A store of JSON documents grouped into named collections
pub trait DocumentStore: Send {
    /// Removes every document of a collection, returning how many were removed
    fn clear(&mut self, collection: &str) -> StorageResult<usize>;

    /// Inserts records into a collection
    fn insert_many(&mut self, collection: &str, records: &[TenderRecord])
        -> StorageResult<InsertReport>;

    /// Counts the documents of a collection
    fn count(&self, collection: &str) -> StorageResult<usize>;

    /// Lists the documents of a collection in insertion order
    fn list(&self, collection: &str) -> StorageResult<Vec<serde_json::Value>>;

    /// Lists every non-empty collection with its document count
    fn collections(&self) -> StorageResult<Vec<(String, usize)>>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Box<S> {
    fn clear(&mut self, collection: &str) -> StorageResult<usize> {
        (**self).clear(collection)
    }

    fn insert_many(&mut self, collection: &str, records: &[TenderRecord])
        -> StorageResult<InsertReport> {
        (**self).insert_many(collection, records)
    }

    fn count(&self, collection: &str) -> StorageResult<usize> {
        (**self).count(collection)
    }

    fn list(&self, collection: &str) -> StorageResult<Vec<serde_json::Value>> {
        (**self).list(collection)
    }

    fn collections(&self) -> StorageResult<Vec<(String, usize)>> {
        (**self).collections()
    }
}
