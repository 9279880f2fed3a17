//! Flat vector store abstraction and the in-memory implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::core::cosine_similarity;
use crate::embedding::Document;
use crate::error::RetrievalError;

/// Limit applied when a search asks for zero results.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// A document with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Similarity score (higher is more similar).
    pub score: f32,
}

/// Sorts results by score, highest first. Ties keep their input order.
pub fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Resolves a requested limit, mapping zero to [`DEFAULT_SEARCH_LIMIT`].
#[must_use]
pub const fn effective_limit(limit: usize) -> usize {
    if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit }
}

/// Storage backend for embedded documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Stores documents, replacing any with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::MissingDocumentId`] if any document has an
    /// empty id; nothing is stored in that case.
    async fn add(&self, docs: &[Document]) -> Result<(), RetrievalError>;

    /// Returns up to `limit` documents most similar to `query`, highest
    /// score first. Documents without an embedding are skipped.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>, RetrievalError>;

    /// Removes documents by id. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    async fn delete(&self, ids: &[String]) -> Result<(), RetrievalError>;

    /// Looks up a document by id.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    async fn get(&self, id: &str) -> Result<Option<Document>, RetrievalError>;

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    async fn count(&self) -> Result<usize, RetrievalError>;

    /// Removes every document.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    async fn clear(&self) -> Result<(), RetrievalError>;
}

/// In-memory [`VectorStore`] keyed by document id.
///
/// Suitable for tests and small corpora. Search is a linear scan.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Document>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`VectorStore::search`], restricted to documents accepted by
    /// `filter`.
    pub async fn search_with_filter<F>(
        &self,
        query: &[f32],
        limit: usize,
        filter: F,
    ) -> Vec<SearchResult>
    where
        F: Fn(&Document) -> bool + Send,
    {
        let documents = self.documents.read().await;
        let mut results: Vec<SearchResult> = documents
            .values()
            .filter(|doc| !doc.embedding.is_empty() && filter(*doc))
            .map(|doc| SearchResult {
                score: cosine_similarity(query, &doc.embedding),
                document: doc.clone(),
            })
            .collect();

        sort_by_score(&mut results);
        results.truncate(effective_limit(limit));
        results
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, docs: &[Document]) -> Result<(), RetrievalError> {
        if docs.iter().any(|d| d.id.is_empty()) {
            return Err(RetrievalError::MissingDocumentId);
        }
        let mut documents = self.documents.write().await;
        for doc in docs {
            documents.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        Ok(self.search_with_filter(query, limit, |_| true).await)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), RetrievalError> {
        let mut documents = self.documents.write().await;
        for id in ids {
            documents.remove(id);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, RetrievalError> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.documents.read().await.len())
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        self.documents.write().await.clear();
        Ok(())
    }
}

/// Metadata predicate: the key is present.
pub fn has_metadata(key: &str) -> impl Fn(&Document) -> bool + Send + '_ {
    move |doc| doc.metadata.contains_key(key)
}

/// Metadata predicate: the key is present with the given value.
pub fn metadata_equals<'a>(
    key: &'a str,
    value: &'a serde_json::Value,
) -> impl Fn(&Document) -> bool + Send + 'a {
    move |doc| doc.metadata.get(key) == Some(value)
}
