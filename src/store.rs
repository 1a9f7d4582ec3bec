//! Process-wide registry of indexed documents.
//!
//! Each entry bundles a document's pages with its vector index, so the two are inserted and
//! removed together under a single write lock. Readers clone the entry's `Arc` and release the
//! lock before calling any external service; a concurrent delete therefore only affects requests
//! that look the identifier up afterwards.

use crate::processing::{DocumentMetadata, Page};
use crate::vector_index::VectorIndex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A resident document: metadata, raw pages, and the index built from their chunks.
pub struct StoredDocument {
    /// Descriptive metadata returned by listings.
    pub metadata: DocumentMetadata,
    /// Extracted pages in document order.
    pub pages: Vec<Page>,
    /// Similarity index over the document's chunks.
    pub index: Box<dyn VectorIndex>,
}

/// Concurrent map from document identifier to [`StoredDocument`].
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Arc<StoredDocument>>>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under its metadata identifier, replacing any previous entry.
    pub async fn insert(&self, document: StoredDocument) -> Arc<StoredDocument> {
        let document = Arc::new(document);
        let id = document.metadata.doc_id.clone();
        let previous = self
            .documents
            .write()
            .await
            .insert(id.clone(), Arc::clone(&document));
        if previous.is_some() {
            tracing::warn!(doc_id = %id, "Replaced an existing document entry");
        }
        document
    }

    /// Look up a resident document.
    pub async fn get(&self, doc_id: &str) -> Option<Arc<StoredDocument>> {
        self.documents.read().await.get(doc_id).cloned()
    }

    /// Remove a document, returning whether it was resident.
    pub async fn remove(&self, doc_id: &str) -> bool {
        self.documents.write().await.remove(doc_id).is_some()
    }

    /// Metadata for every resident document, oldest upload first.
    pub async fn list(&self) -> Vec<DocumentMetadata> {
        let mut documents: Vec<DocumentMetadata> = self
            .documents
            .read()
            .await
            .values()
            .map(|document| document.metadata.clone())
            .collect();
        documents.sort_by(|left, right| {
            left.uploaded_at
                .cmp(&right.uploaded_at)
                .then_with(|| left.doc_id.cmp(&right.doc_id))
        });
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::Chunk;
    use crate::vector_index::InMemoryVectorIndex;

    fn document(doc_id: &str, uploaded_at: &str) -> StoredDocument {
        let chunk = Chunk {
            position: 0,
            page: 1,
            text: "hello".into(),
        };
        StoredDocument {
            metadata: DocumentMetadata {
                doc_id: doc_id.into(),
                filename: format!("{doc_id}.pdf"),
                page_count: 1,
                chunk_count: 1,
                sha256: "00".into(),
                uploaded_at: uploaded_at.into(),
            },
            pages: vec![Page {
                number: 1,
                text: "hello".into(),
            }],
            index: Box::new(
                InMemoryVectorIndex::build(vec![chunk], vec![vec![1.0]]).expect("index"),
            ),
        }
    }

    #[tokio::test]
    async fn insert_then_get_returns_same_entry() {
        let store = DocumentStore::new();
        let inserted = store.insert(document("a", "2026-01-01T00:00:00Z")).await;
        let fetched = store.get("a").await.expect("resident");
        assert!(Arc::ptr_eq(&inserted, &fetched));
        assert_eq!(fetched.pages.len(), 1);
        assert_eq!(fetched.index.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = DocumentStore::new();
        store.insert(document("a", "2026-01-01T00:00:00Z")).await;

        assert!(store.remove("a").await);
        assert!(!store.remove("a").await);
        assert!(store.get("a").await.is_none());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn held_entry_survives_concurrent_removal() {
        let store = DocumentStore::new();
        store.insert(document("a", "2026-01-01T00:00:00Z")).await;
        let held = store.get("a").await.expect("resident");

        store.remove("a").await;

        assert!(store.get("a").await.is_none());
        assert_eq!(held.pages[0].text, "hello");
    }

    #[tokio::test]
    async fn list_orders_by_upload_time() {
        let store = DocumentStore::new();
        store.insert(document("late", "2026-03-01T00:00:00Z")).await;
        store.insert(document("early", "2026-01-01T00:00:00Z")).await;

        let ids: Vec<String> = store.list().await.into_iter().map(|doc| doc.doc_id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }
}
