//! MongoDB implementation of [`DocumentStore`]
//!
//! Each destination is a MongoDB collection. The store uses the driver's
//! blocking API, so call it from a blocking context such as
//! `tokio::task::spawn_blocking`, never directly on an async worker.

use crate::record::TenderRecord;
use crate::storage::traits::{DocumentStore, InsertReport, StorageResult};
use mongodb::bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{FindOptions, InsertManyOptions};
use mongodb::sync::{Client, Collection, Database};

/// Database used when the connection string does not name one
pub const DEFAULT_DATABASE: &str = "tenders";

/// MongoDB document store
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connects to `uri` (`mongodb://` or `mongodb+srv://`)
    ///
    /// The driver connects lazily; an unreachable server surfaces on the first
    /// operation rather than here.
    pub fn connect(uri: &str) -> StorageResult<Self> {
        let client = Client::with_uri_str(uri)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        Ok(Self { database })
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

impl std::fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStore")
            .field("database", &self.database.name())
            .finish()
    }
}

impl DocumentStore for MongoStore {
    fn clear(&mut self, collection: &str) -> StorageResult<usize> {
        let result = self.collection(collection).delete_many(doc! {}, None)?;
        Ok(result.deleted_count as usize)
    }

    /// Unordered bulk insert; per-document write errors land in the report
    fn insert_many(
        &mut self,
        collection: &str,
        records: &[TenderRecord],
    ) -> StorageResult<InsertReport> {
        let mut report = InsertReport::default();
        let mut documents = Vec::with_capacity(records.len());
        let mut keys = Vec::with_capacity(records.len());

        for record in records {
            match mongodb::bson::to_document(record) {
                Ok(document) => {
                    documents.push(document);
                    keys.push(record.identity_key.as_str());
                }
                Err(e) => report
                    .failures
                    .push(format!("{}: serialization failed: {}", record.identity_key, e)),
            }
        }

        if documents.is_empty() {
            return Ok(report);
        }

        let attempted = documents.len();
        let options = InsertManyOptions::builder().ordered(false).build();

        match self.collection(collection).insert_many(documents, options) {
            Ok(result) => report.inserted += result.inserted_ids.len(),
            Err(e) => {
                let write_errors = match e.kind.as_ref() {
                    ErrorKind::BulkWrite(failure) => failure.write_errors.clone(),
                    _ => None,
                };
                let Some(write_errors) = write_errors else {
                    return Err(e.into());
                };
                record_write_errors(
                    &mut report,
                    attempted,
                    &keys,
                    write_errors
                        .into_iter()
                        .map(|error| (error.index, error.message)),
                );
            }
        }

        Ok(report)
    }

    fn count(&self, collection: &str) -> StorageResult<usize> {
        let count = self.collection(collection).count_documents(doc! {}, None)?;
        Ok(count as usize)
    }

    fn list(&self, collection: &str) -> StorageResult<Vec<serde_json::Value>> {
        let options = FindOptions::builder()
            .projection(doc! { "_id": 0 })
            .sort(doc! { "_id": 1 })
            .build();

        let mut documents = Vec::new();
        for document in self.collection(collection).find(doc! {}, options)? {
            documents.push(serde_json::to_value(document?)?);
        }
        Ok(documents)
    }

    fn collections(&self) -> StorageResult<Vec<(String, usize)>> {
        let mut names = self.database.list_collection_names(None)?;
        names.sort();

        let mut collections = Vec::with_capacity(names.len());
        for name in names {
            let count = self.count(&name)?;
            if count > 0 {
                collections.push((name, count));
            }
        }
        Ok(collections)
    }
}

/// Folds the write errors of an unordered bulk insert into `report`
///
/// `index` is the position of the failed document within the batch sent, as
/// reported by the server.
fn record_write_errors(
    report: &mut InsertReport,
    attempted: usize,
    keys: &[&str],
    errors: impl IntoIterator<Item = (usize, String)>,
) {
    let mut failed = 0;
    for (index, message) in errors {
        failed += 1;
        let key = keys.get(index).copied().unwrap_or("<unknown>");
        report.failures.push(format!("{}: {}", key, message));
    }
    report.inserted += attempted.saturating_sub(failed);
}
