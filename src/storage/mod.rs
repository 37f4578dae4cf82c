//! Storage module: the document store and per-source synchronization
//!
//! Each source's tenders live in one logical collection. A run replaces a
//! collection wholesale through [`sync`]; nothing else writes to it.

mod mongo;
mod schema;
mod sqlite;
mod sync;
mod traits;

pub use mongo::MongoStore;
pub use sqlite::SqliteStore;
pub use sync::{sync, SyncOutcome};
pub use traits::{DocumentStore, InsertReport, StorageError, StorageResult};

use std::path::Path;
use std::sync::{Arc, Mutex};

/// A document store shared between source pipelines
pub type SharedStore = Arc<Mutex<dyn DocumentStore>>;

/// Opens a store from a connection string
///
/// Accepted forms: `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>`, a
/// bare file path, or a `mongodb://` / `mongodb+srv://` URI. MongoDB stores
/// block on I/O; open and use them from a blocking context.
///
/// ```
/// use tender_sweep::storage::{open_store, DocumentStore};
///
/// let store = open_store("sqlite::memory:").unwrap();
/// assert_eq!(store.count("ascl").unwrap(), 0);
/// ```
pub fn open_store(connection: &str) -> StorageResult<Box<dyn DocumentStore>> {
    let connection = connection.trim();

    if connection == "sqlite::memory:" {
        return Ok(Box::new(SqliteStore::new_in_memory()?));
    }

    if connection.starts_with("mongodb://") || connection.starts_with("mongodb+srv://") {
        return Ok(Box::new(MongoStore::connect(connection)?));
    }

    let path = if let Some(path) = connection.strip_prefix("sqlite://") {
        path
    } else if let Some(path) = connection.strip_prefix("sqlite:") {
        path
    } else if connection.contains("://") {
        return Err(StorageError::UnsupportedConnection(connection.to_string()));
    } else {
        connection
    };

    if path.is_empty() {
        return Err(StorageError::UnsupportedConnection(connection.to_string()));
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(Box::new(SqliteStore::new(path)?))
}

/// Wraps a store for sharing across tasks
pub fn shared(store: impl DocumentStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(store))
}
