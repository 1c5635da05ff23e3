//! In-memory store executor
//!
//! Evaluates native filters and the `$match` / `$group` pipeline stages over
//! documents held in process. Serves as the reference executor and as the
//! fixture collection in tests.

mod aggregate;
mod matcher;

pub use aggregate::{compile_pipeline, GroupStage, Stage};
pub use matcher::{Condition, Predicate};

use crate::error::{ExecutorError, ExecutorResult};
use crate::executor::StoreExecutor;
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use matcher::values_equal;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{trace, warn};

/// Default primary key field of stored documents
pub const ID_FIELD: &str = "_id";

/// Collections of documents behind a lock
#[derive(Debug)]
pub struct MemoryStore {
    /// Field holding each document's unique key
    key: String,
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_key(ID_FIELD)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store keying documents on `key` instead of `_id`.
    ///
    /// Must match the `native_key` the adapter writes with.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Field documents are keyed on
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Builder-style: seed `collection` with `documents`.
    ///
    /// Documents without a key get a fresh `ObjectId`; a duplicate key is
    /// skipped.
    #[must_use]
    pub fn with_documents<I>(self, collection: &str, documents: I) -> Self
    where
        I: IntoIterator<Item = Document>,
    {
        for document in documents {
            if let Err(err) = self.insert_document(collection, document) {
                warn!(collection, error = %err, "skipping seed document");
            }
        }
        self
    }

    /// Number of documents in `collection`
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |documents| documents.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Snapshot of every document in `collection`, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn insert_document(&self, collection: &str, document: Document) -> ExecutorResult<Document> {
        let stored = key_first(&self.key, document);
        let id = stored.get(&self.key).cloned().unwrap_or(Bson::Null);

        let mut collections = self.collections.write();
        let documents = collections.entry(collection.to_string()).or_default();
        let duplicate = documents
            .iter()
            .any(|existing| existing.get(&self.key).is_some_and(|other| values_equal(other, &id)));
        if duplicate {
            return Err(ExecutorError::rejected(format!(
                "duplicate key error collection: {} dup key: {{ {}: {} }}",
                collection, self.key, id
            )));
        }

        documents.push(stored.clone());
        Ok(stored)
    }
}

/// Put `key` first, generating an `ObjectId` when the document has none
fn key_first(key: &str, mut document: Document) -> Document {
    let id = document
        .remove(key)
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut stored = Document::new();
    stored.insert(key, id);
    for (field, value) in document {
        stored.insert(field, value);
    }
    stored
}

#[async_trait]
impl StoreExecutor for MemoryStore {
    async fn find(&self, collection: &str, filter: Document) -> ExecutorResult<Vec<Document>> {
        let predicate = Predicate::compile(&filter)?;
        let found: Vec<Document> = self
            .collections
            .read()
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| predicate.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        trace!(collection, filter = %filter, found = found.len(), "find");
        Ok(found)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ExecutorResult<Vec<Document>> {
        let stages = compile_pipeline(&pipeline)?;
        let input = self.documents(collection);
        let rows = stages
            .iter()
            .fold(input, |documents, stage| stage.run(documents));

        trace!(collection, stages = stages.len(), rows = rows.len(), "aggregate");
        Ok(rows)
    }

    async fn insert(&self, collection: &str, document: Document) -> ExecutorResult<Document> {
        let stored = self.insert_document(collection, document)?;
        trace!(collection, id = ?stored.get(&self.key), "insert");
        Ok(stored)
    }
}
