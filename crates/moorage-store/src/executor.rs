//! Store executor seam
//!
//! The adapter never talks to a database directly. It hands native filters,
//! pipelines and documents to a [`StoreExecutor`] and relays whatever comes
//! back. Connection and pool management live behind this trait.

use crate::error::ExecutorResult;
use async_trait::async_trait;
use bson::Document;

/// Runs native requests against one store.
#[async_trait]
pub trait StoreExecutor: Send + Sync {
    /// Return every document in `collection` matching `filter`
    ///
    /// An empty filter matches everything.
    async fn find(&self, collection: &str, filter: Document) -> ExecutorResult<Vec<Document>>;

    /// Run an aggregation pipeline and return its output rows
    ///
    /// A pipeline whose input is empty may return no rows at all.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ExecutorResult<Vec<Document>>;

    /// Insert one document and return it as stored
    ///
    /// The store assigns a primary key when the document carries none.
    async fn insert(&self, collection: &str, document: Document) -> ExecutorResult<Document>;
}

// ============================================================================
// Blanket Implementations
// ============================================================================

/// Blanket implementation of StoreExecutor for Arc<T>
#[async_trait]
impl<T: StoreExecutor + ?Sized> StoreExecutor for std::sync::Arc<T> {
    async fn find(&self, collection: &str, filter: Document) -> ExecutorResult<Vec<Document>> {
        (**self).find(collection, filter).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ExecutorResult<Vec<Document>> {
        (**self).aggregate(collection, pipeline).await
    }

    async fn insert(&self, collection: &str, document: Document) -> ExecutorResult<Document> {
        (**self).insert(collection, document).await
    }
}
