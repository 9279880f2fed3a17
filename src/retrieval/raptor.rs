//! RAPTOR-style hierarchical store.
//!
//! Documents go to a flat base store and become leaves of a
//! [`HierarchicalTree`]. Every `add` rebuilds the summary levels from the
//! full leaf set: leaves are clustered, each cluster is summarized and the
//! summary embedded, and the resulting parents are clustered again until
//! one node remains, clustering stops making progress, or `max_levels` is
//! reached.
//!
//! The rebuild happens in a scratch tree that replaces the live one only
//! when it completes, so readers never observe a half-built level.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cluster::greedy_clusters;
use super::config::RaptorConfig;
use super::store::{MemoryStore, SearchResult, VectorStore, effective_limit, sort_by_score};
use super::summarizer::Summarizer;
use super::tree::{HierarchicalTree, NodeId, TreeSnapshot};
use crate::core::run_cancellable;
use crate::core::text::clip;
use crate::embedding::{Document, Embedder, Metadata, ensure_batch_len};
use crate::error::RetrievalError;

/// Character budget of the concatenation used when summarization fails.
const FALLBACK_SUMMARY_LEN: usize = 500;

/// Score multiplier applied to parent-context entries.
const CONTEXT_SCORE_FACTOR: f32 = 0.8;

struct Inner<S> {
    base: S,
    tree: HierarchicalTree,
}

/// Hierarchical retrieval store over a flat [`VectorStore`].
///
/// One lock guards both the base store and the tree: writers (`add`,
/// `delete`, `clear`) are serialized and exclude readers, so a search sees
/// either the tree before a write or the tree after it.
pub struct RaptorStore<S: VectorStore = MemoryStore> {
    inner: RwLock<Inner<S>>,
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<dyn Summarizer>,
    config: RaptorConfig,
}

impl<S: VectorStore> RaptorStore<S> {
    /// Creates a store with an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        base: S,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        config: RaptorConfig,
    ) -> Result<Self, RetrievalError> {
        config.validate()?;
        Ok(Self {
            inner: RwLock::new(Inner {
                base,
                tree: HierarchicalTree::new(),
            }),
            embedder,
            summarizer,
            config,
        })
    }

    /// The store's configuration.
    pub const fn config(&self) -> &RaptorConfig {
        &self.config
    }

    /// Adds pre-embedded documents and rebuilds the summary levels.
    ///
    /// A document whose id is already present replaces the old leaf. If
    /// `cancel` fires during the rebuild, the documents stay stored as
    /// leaves and the tree has no summary levels until the next `add`.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::MissingDocumentId`] / [`RetrievalError::MissingEmbedding`]
    ///   if any document is incomplete; nothing is stored.
    /// - [`RetrievalError::Cancelled`] if the rebuild was cancelled.
    /// - Any error from the base store.
    pub async fn add(&self, docs: &[Document], cancel: &CancellationToken) -> Result<(), RetrievalError> {
        for doc in docs {
            if doc.id.is_empty() {
                return Err(RetrievalError::MissingDocumentId);
            }
            if doc.embedding.is_empty() {
                return Err(RetrievalError::MissingEmbedding { id: doc.id.clone() });
            }
        }
        if docs.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        inner.base.add(docs).await?;

        let mut tree = inner.tree.leaves_only();
        for doc in docs {
            tree.upsert_leaf(doc);
        }

        let result = self.build(&mut tree, cancel).await;
        match &result {
            Ok(()) => info!(
                added = docs.len(),
                leaves = tree.leaf_count(),
                height = tree.height(),
                "tree rebuilt"
            ),
            Err(e) => warn!(error = %e, "tree build aborted, keeping leaves only"),
        }
        inner.tree = if result.is_ok() { tree } else { tree.leaves_only() };
        result
    }

    /// Embeds the documents that lack an embedding, then [`add`](Self::add)s
    /// them all.
    ///
    /// # Errors
    ///
    /// As [`add`](Self::add), plus [`RetrievalError::Embedding`] if the
    /// batch embedding call fails.
    pub async fn add_texts(
        &self,
        mut docs: Vec<Document>,
        cancel: &CancellationToken,
    ) -> Result<(), RetrievalError> {
        let pending: Vec<usize> = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| d.embedding.is_empty())
            .map(|(i, _)| i)
            .collect();

        if !pending.is_empty() {
            let texts: Vec<String> = pending.iter().map(|&i| docs[i].content.clone()).collect();
            let vectors = run_cancellable(cancel, self.embedder.embed_batch(&texts)).await??;
            ensure_batch_len(texts.len(), &vectors)?;
            for (i, vector) in pending.into_iter().zip(vectors) {
                docs[i].embedding = vector;
            }
        }

        self.add(&docs, cancel).await
    }

    async fn build(
        &self,
        tree: &mut HierarchicalTree,
        cancel: &CancellationToken,
    ) -> Result<(), RetrievalError> {
        let capacity = self.config.cluster_capacity();
        let threshold = self.config.similarity_threshold;
        let mut current: Vec<NodeId> = tree.level(0).to_vec();
        let mut level = 0;

        while level < self.config.max_levels && current.len() > 1 {
            level += 1;

            let vectors: Vec<Vec<f32>> = current
                .iter()
                .map(|&n| tree.node(n).map(|node| node.embedding.clone()).unwrap_or_default())
                .collect();
            let clusters = greedy_clusters(&vectors, capacity, threshold);
            if clusters.len() == current.len() {
                debug!(level, nodes = current.len(), "no clusters merged, stopping");
                break;
            }

            let mut parents = Vec::with_capacity(clusters.len());
            for (i, cluster) in clusters.iter().enumerate() {
                let members: Vec<NodeId> = cluster.iter().map(|&k| current[k]).collect();
                let texts: Vec<String> = members
                    .iter()
                    .filter_map(|&n| tree.node(n))
                    .map(|node| node.text().to_string())
                    .collect();

                let summary = match run_cancellable(cancel, self.summarizer.summarize(&texts)).await? {
                    Ok(summary) => summary,
                    Err(RetrievalError::Cancelled) => return Err(RetrievalError::Cancelled),
                    Err(e) => {
                        warn!(level, cluster = i, error = %e, "summarization failed, using concatenation");
                        clip(&texts.join("\n\n"), FALLBACK_SUMMARY_LEN)
                    }
                };

                let embedding = match run_cancellable(cancel, self.embedder.embed(&summary)).await? {
                    Ok(embedding) => embedding,
                    Err(RetrievalError::Cancelled) => return Err(RetrievalError::Cancelled),
                    Err(e) => {
                        warn!(level, cluster = i, error = %e, "summary embedding failed, dropping cluster");
                        continue;
                    }
                };

                parents.push(tree.add_parent(format!("cluster_l{level}_{i}"), summary, embedding, members));
            }

            debug!(level, clusters = clusters.len(), nodes = parents.len(), "built level");
            if !parents.is_empty() {
                tree.set_level(level, parents.clone());
            }
            current = parents;
        }

        tree.set_root(&current);
        Ok(())
    }

    /// Hierarchical search by vector. A `limit` of zero means the default.
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature matches the flat store.
    pub async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        let inner = self.inner.read().await;
        let tree = &inner.tree;
        Ok(tree
            .search(query, self.config.similarity_threshold, effective_limit(limit))
            .into_iter()
            .filter_map(|(id, score)| {
                tree.node(id).map(|node| SearchResult {
                    document: node.to_document(),
                    score,
                })
            })
            .collect())
    }

    /// Embeds `query` and runs [`search`](Self::search).
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Embedding`] or [`RetrievalError::Cancelled`].
    pub async fn search_text(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        let embedding = run_cancellable(cancel, self.embedder.embed(query)).await??;
        self.search(&embedding, limit).await
    }

    /// Two-hop search: leaf hits plus the summary of each hit's parent.
    ///
    /// Runs a hierarchical search for twice the limit, then adds one
    /// `{parent}_context` entry per distinct parent, scored at 0.8 of the
    /// best hit under it. The merged list is re-sorted and cut to `limit`.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Embedding`] or [`RetrievalError::Cancelled`].
    pub async fn search_with_context(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        let limit = effective_limit(limit);
        let embedding = run_cancellable(cancel, self.embedder.embed(query)).await??;

        let inner = self.inner.read().await;
        let tree = &inner.tree;
        let hits = tree.search(&embedding, self.config.similarity_threshold, limit.saturating_mul(2));

        let mut results = Vec::with_capacity(hits.len() * 2);
        let mut seen_parents = BTreeSet::new();
        for (id, score) in hits {
            let Some(node) = tree.node(id) else {
                continue;
            };
            results.push(SearchResult {
                document: node.to_document(),
                score,
            });

            if let Some(parent) = tree.parent(id)
                && seen_parents.insert(parent.id.clone())
            {
                let mut metadata = Metadata::new();
                metadata.insert("type".to_string(), "context".into());
                metadata.insert("level".to_string(), parent.level.into());
                results.push(SearchResult {
                    document: Document {
                        id: format!("{}_context", parent.id),
                        content: format!("[Context] {}", parent.summary),
                        embedding: Vec::new(),
                        metadata,
                    },
                    score: score * CONTEXT_SCORE_FACTOR,
                });
            }
        }

        sort_by_score(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    /// Removes documents from the base store and their nodes from every
    /// tree level.
    ///
    /// Ancestor summaries are left as they were; they catch up on the next
    /// `add`.
    ///
    /// # Errors
    ///
    /// Any error from the base store.
    pub async fn delete(&self, ids: &[String]) -> Result<(), RetrievalError> {
        let mut inner = self.inner.write().await;
        inner.base.delete(ids).await?;
        let set: BTreeSet<String> = ids.iter().cloned().collect();
        let removed = inner.tree.remove(&set);
        debug!(requested = ids.len(), removed, "deleted nodes");
        Ok(())
    }

    /// Looks up a stored document.
    ///
    /// # Errors
    ///
    /// Any error from the base store.
    pub async fn get(&self, id: &str) -> Result<Option<Document>, RetrievalError> {
        self.inner.read().await.base.get(id).await
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Any error from the base store.
    pub async fn count(&self) -> Result<usize, RetrievalError> {
        self.inner.read().await.base.count().await
    }

    /// Empties the base store and the tree.
    ///
    /// # Errors
    ///
    /// Any error from the base store.
    pub async fn clear(&self) -> Result<(), RetrievalError> {
        let mut inner = self.inner.write().await;
        inner.tree = HierarchicalTree::new();
        inner.base.clear().await
    }

    /// Copy of the current tree.
    pub async fn tree(&self) -> HierarchicalTree {
        self.inner.read().await.tree.clone()
    }

    /// Serializable view of the current tree.
    pub async fn snapshot(&self) -> TreeSnapshot {
        self.inner.read().await.tree.snapshot()
    }
}

impl<S: VectorStore> std::fmt::Debug for RaptorStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaptorStore")
            .field("embedder", &self.embedder.model())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::embedding::{HashEmbedder, Vector};
    use crate::retrieval::summarizer::ConcatSummarizer;
    use crate::retrieval::tree::TreeRoot;

    fn config(max_levels: usize, cluster_size: usize) -> RaptorConfig {
        RaptorConfig {
            max_levels,
            cluster_size,
            ..RaptorConfig::default()
        }
    }

    fn store_with(config: RaptorConfig) -> RaptorStore {
        RaptorStore::new(
            MemoryStore::new(),
            Arc::new(HashEmbedder::default()),
            Arc::new(ConcatSummarizer),
            config,
        )
        .unwrap_or_else(|_| unreachable!())
    }

    fn text_doc(id: &str, content: &str) -> Document {
        Document::new(id, content).with_embedding(HashEmbedder::default().embed_sync(content))
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _texts: &[String]) -> Result<String, RetrievalError> {
            Err(RetrievalError::Summarization {
                message: "model offline".to_string(),
            })
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vector, RetrievalError> {
            Err(RetrievalError::Embedding {
                message: "no backend".to_string(),
            })
        }

        fn dimension(&self) -> usize {
            0
        }

        fn model(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = RaptorStore::new(
            MemoryStore::new(),
            Arc::new(HashEmbedder::default()),
            Arc::new(ConcatSummarizer),
            config(0, 5),
        );
        assert!(matches!(
            result,
            Err(RetrievalError::InvalidConfig { name: "max_levels", .. })
        ));
    }

    #[tokio::test]
    async fn test_two_documents_get_single_root() {
        let store = store_with(config(2, 2));
        let token = CancellationToken::new();
        store
            .add(
                &[
                    text_doc("a", "rust ownership and borrowing"),
                    text_doc("b", "tokio tasks and channels"),
                ],
                &token,
            )
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let tree = store.tree().await;
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.level(1).len(), 1);

        let parent = tree.node(tree.level(1)[0]).unwrap_or_else(|| unreachable!());
        assert_eq!(parent.id, "cluster_l1_0");
        assert_eq!(parent.documents, ["a", "b"]);
        assert_eq!(
            parent.summary,
            "rust ownership and borrowing | tokio tasks and channels"
        );
        assert_eq!(tree.root(), Some(&TreeRoot::Node(tree.level(1)[0])));
    }

    #[tokio::test]
    async fn test_unmergeable_nodes_get_aggregate_root() {
        // Capacity 2 with orthogonal vectors: every node seeds its own cluster.
        let store = RaptorStore::new(
            MemoryStore::new(),
            Arc::new(HashEmbedder::default()),
            Arc::new(ConcatSummarizer),
            config(3, 2),
        )
        .unwrap_or_else(|_| unreachable!());
        let docs = [
            Document::new("x", "x").with_embedding(vec![1.0, 0.0, 0.0]),
            Document::new("y", "y").with_embedding(vec![0.0, 1.0, 0.0]),
            Document::new("z", "z").with_embedding(vec![0.0, 0.0, 1.0]),
        ];
        store
            .add(&docs, &CancellationToken::new())
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let tree = store.tree().await;
        assert_eq!(tree.height(), 0);
        match tree.root() {
            Some(TreeRoot::Aggregate { id, level, children, .. }) => {
                assert_eq!(id, "root");
                assert_eq!(*level, 1);
                assert_eq!(children.len(), 3);
            }
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_round_trip() {
        let store = store_with(config(3, 2));
        let token = CancellationToken::new();
        store
            .add_texts(
                vec![
                    Document::new("a", "vector databases index embeddings"),
                    Document::new("b", "bread recipes need flour and yeast"),
                    Document::new("c", "mountain hiking trails in autumn"),
                ],
                &token,
            )
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let results = store
            .search_text("bread recipes need flour and yeast", 2, &token)
            .await
            .unwrap_or_default();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "b");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_zero_limit_uses_default() {
        let store = store_with(config(3, 5));
        let docs: Vec<Document> = (0..15)
            .map(|i| text_doc(&format!("d{i}"), &format!("document number {i}")))
            .collect();
        store
            .add(&docs, &CancellationToken::new())
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        let query = HashEmbedder::default().embed_sync("document number 3");
        let results = store.search(&query, 0).await.unwrap_or_default();
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn test_add_validates_documents() {
        let store = store_with(RaptorConfig::default());
        let token = CancellationToken::new();

        let missing_id = store.add(&[text_doc("", "text")], &token).await;
        assert!(matches!(missing_id, Err(RetrievalError::MissingDocumentId)));

        let missing_embedding = store
            .add(&[text_doc("a", "text"), Document::new("b", "text")], &token)
            .await;
        assert!(matches!(
            missing_embedding,
            Err(RetrievalError::MissingEmbedding { ref id }) if id == "b"
        ));
        assert_eq!(store.count().await.unwrap_or_default(), 0);
    }

    #[tokio::test]
    async fn test_readd_replaces_leaf() {
        let store = store_with(config(2, 2));
        let token = CancellationToken::new();
        store
            .add(&[text_doc("a", "first"), text_doc("b", "second")], &token)
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        store
            .add(&[text_doc("a", "first revised")], &token)
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let tree = store.tree().await;
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(store.count().await.unwrap_or_default(), 2);
        let leaf = tree.find("a").and_then(|n| tree.node(n));
        assert_eq!(leaf.map(|n| n.content.as_str()), Some("first revised"));
        let parent = tree.node(tree.level(1)[0]).unwrap_or_else(|| unreachable!());
        assert!(parent.summary.contains("first revised"));
    }

    #[tokio::test]
    async fn test_delete_leaves_stale_summary() {
        let store = store_with(config(2, 2));
        let token = CancellationToken::new();
        store
            .add(&[text_doc("a", "alpha text"), text_doc("b", "beta text")], &token)
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        store
            .delete(&["a".to_string()])
            .await
            .unwrap_or_else(|e| panic!("delete failed: {e}"));

        assert_eq!(store.count().await.unwrap_or_default(), 1);
        assert!(store.get("a").await.unwrap_or_default().is_none());

        let results = store
            .search_text("alpha text", 10, &token)
            .await
            .unwrap_or_default();
        assert!(results.iter().all(|r| r.document.id != "a"));

        // Known limitation: the parent still summarizes the deleted leaf.
        let tree = store.tree().await;
        let parent = tree.node(tree.level(1)[0]).unwrap_or_else(|| unreachable!());
        assert!(parent.summary.contains("alpha text"));
        assert!(parent.documents.contains(&"a".to_string()));
    }

    #[tokio::test]
    async fn test_clear_empties_everything() {
        let store = store_with(config(2, 2));
        store
            .add(
                &[text_doc("a", "one"), text_doc("b", "two")],
                &CancellationToken::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        store.clear().await.unwrap_or_else(|e| panic!("clear failed: {e}"));

        assert_eq!(store.count().await.unwrap_or_default(), 0);
        let tree = store.tree().await;
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
        assert!(tree.levels().is_empty());
    }

    #[tokio::test]
    async fn test_search_with_context_adds_parent_summary() {
        let store = store_with(config(2, 5));
        let token = CancellationToken::new();
        store
            .add(
                &[
                    text_doc("a", "async runtimes schedule tasks"),
                    text_doc("b", "async channels pass messages"),
                ],
                &token,
            )
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let results = store
            .search_with_context("async runtimes schedule tasks", 5, &token)
            .await
            .unwrap_or_default();

        let contexts: Vec<&SearchResult> = results
            .iter()
            .filter(|r| r.document.id.ends_with("_context"))
            .collect();
        assert_eq!(contexts.len(), 1);
        let context = contexts[0];
        assert_eq!(context.document.id, "cluster_l1_0_context");
        assert!(context.document.content.starts_with("[Context] "));
        assert_eq!(context.document.metadata["type"], "context");
        assert_eq!(context.document.metadata["level"], 1);

        let top = &results[0];
        assert_eq!(top.document.id, "a");
        assert!((context.score - top.score * 0.8).abs() < 1e-5);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_with_context_respects_limit() {
        let store = store_with(config(2, 5));
        let token = CancellationToken::new();
        store
            .add(
                &[text_doc("a", "one"), text_doc("b", "two"), text_doc("c", "three")],
                &token,
            )
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        let results = store
            .search_with_context("one", 2, &token)
            .await
            .unwrap_or_default();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_build_keeps_leaves_only() {
        let store = store_with(config(2, 2));
        let token = CancellationToken::new();
        token.cancel();

        let result = store
            .add(&[text_doc("a", "one"), text_doc("b", "two")], &token)
            .await;
        assert!(matches!(result, Err(RetrievalError::Cancelled)));

        assert_eq!(store.count().await.unwrap_or_default(), 2);
        let tree = store.tree().await;
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.height(), 0);
        assert!(tree.root().is_none());

        // The next add rebuilds over every leaf.
        store
            .add(&[text_doc("c", "three")], &CancellationToken::new())
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        let tree = store.tree().await;
        assert_eq!(tree.leaf_count(), 3);
        assert!(tree.root().is_some());
    }

    #[tokio::test]
    async fn test_summarizer_failure_falls_back_to_concatenation() {
        let store = RaptorStore::new(
            MemoryStore::new(),
            Arc::new(HashEmbedder::default()),
            Arc::new(FailingSummarizer),
            config(2, 2),
        )
        .unwrap_or_else(|_| unreachable!());
        store
            .add(
                &[text_doc("a", "first"), text_doc("b", "second")],
                &CancellationToken::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let tree = store.tree().await;
        let parent = tree.node(tree.level(1)[0]).unwrap_or_else(|| unreachable!());
        assert_eq!(parent.summary, "first\n\nsecond");
    }

    #[tokio::test]
    async fn test_embedding_failure_drops_cluster() {
        let store = RaptorStore::new(
            MemoryStore::new(),
            Arc::new(FailingEmbedder),
            Arc::new(ConcatSummarizer),
            config(2, 2),
        )
        .unwrap_or_else(|_| unreachable!());
        store
            .add(
                &[text_doc("a", "first"), text_doc("b", "second")],
                &CancellationToken::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let tree = store.tree().await;
        assert_eq!(tree.leaf_count(), 2);
        assert!(tree.level(1).is_empty());
        assert!(tree.root().is_none());
    }

    #[tokio::test]
    async fn test_add_texts_reports_embedding_failure() {
        let store = RaptorStore::new(
            MemoryStore::new(),
            Arc::new(FailingEmbedder),
            Arc::new(ConcatSummarizer),
            RaptorConfig::default(),
        )
        .unwrap_or_else(|_| unreachable!());
        let result = store
            .add_texts(vec![Document::new("a", "text")], &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(RetrievalError::Embedding { .. })));
        assert_eq!(store.count().await.unwrap_or_default(), 0);
    }

    #[tokio::test]
    async fn test_max_levels_bounds_height() {
        let store = store_with(RaptorConfig {
            max_levels: 1,
            cluster_size: 2,
            similarity_threshold: 0.01,
            ..RaptorConfig::default()
        });
        let docs: Vec<Document> = (0..8)
            .map(|i| Document::new(format!("d{i}"), "same").with_embedding(vec![1.0, 0.0]))
            .collect();
        store
            .add(&docs, &CancellationToken::new())
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let tree = store.tree().await;
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.level(1).len(), 4);
        assert!(matches!(tree.root(), Some(TreeRoot::Aggregate { level: 2, .. })));
    }
}
