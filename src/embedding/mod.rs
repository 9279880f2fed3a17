//! Text embedding abstraction and documents.
//!
//! The retrieval tree never computes embeddings itself for leaves; callers
//! either supply them on [`Document::embedding`] or go through an
//! [`Embedder`] (see `RaptorStore::add_texts`). Summary nodes are embedded
//! through the same trait during tree build.

mod hash;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use hash::{DEFAULT_HASH_DIMENSION, HashEmbedder};

use crate::error::RetrievalError;

/// Dense embedding vector.
pub type Vector = Vec<f32>;

/// Free-form document metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A text document with an optional embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: String,
    /// Text content.
    pub content: String,
    /// Vector representation (empty until embedded).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vector,
    /// Additional information carried through search results.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Document {
    /// Creates a document without an embedding.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attaches an embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vector) -> Self {
        self.embedding = embedding;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Text-to-vector capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Embedding`] when the backend fails.
    async fn embed(&self, text: &str) -> Result<Vector, RetrievalError>;

    /// Embeds several texts, preserving order.
    ///
    /// The default implementation calls [`Embedder::embed`] sequentially.
    /// Implementations must return exactly one vector per input.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Embedding`] on backend failure or when the
    /// backend returns the wrong number of vectors.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, RetrievalError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Model identifier.
    fn model(&self) -> &str;
}

/// Checks that a batch embedding call returned one vector per input.
///
/// # Errors
///
/// Returns [`RetrievalError::Embedding`] on a count mismatch.
pub fn ensure_batch_len(expected: usize, vectors: &[Vector]) -> Result<(), RetrievalError> {
    if vectors.len() == expected {
        Ok(())
    } else {
        Err(RetrievalError::Embedding {
            message: format!(
                "batch returned {} vectors for {expected} inputs",
                vectors.len()
            ),
        })
    }
}
