//! Arena-backed hierarchical retrieval tree.
//!
//! Nodes live in a slab indexed by [`NodeId`]. Children are owned by index
//! and the parent link is a plain index used only for context lookup.
//! Removed nodes leave a tombstone so existing indices stay valid.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::{cosine_similarity, truncate};
use crate::embedding::{Document, Metadata, Vector};

/// Index of a node in a [`HierarchicalTree`].
pub type NodeId = usize;

/// Id of the synthetic aggregator root.
pub const AGGREGATE_ROOT_ID: &str = "root";

/// A leaf (one per document) or a cluster summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Document id for leaves, `cluster_l{level}_{n}` for summaries.
    pub id: String,
    /// 0 for leaves; one more than the highest child otherwise.
    pub level: usize,
    /// Leaf text (empty for summaries).
    pub content: String,
    /// Summary text (empty for leaves).
    pub summary: String,
    /// Document embedding for leaves, summary embedding otherwise.
    pub embedding: Vector,
    /// Child node indices, in cluster order.
    pub children: Vec<NodeId>,
    /// Parent index, if this node has been clustered.
    pub parent: Option<NodeId>,
    /// Ids of every document under this node, in first-seen order.
    pub documents: Vec<String>,
    /// Document metadata for leaves, `level`/`child_count` for summaries.
    pub metadata: Metadata,
}

impl TreeNode {
    /// Creates a leaf from a document.
    #[must_use]
    pub fn leaf(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            level: 0,
            content: doc.content.clone(),
            summary: String::new(),
            embedding: doc.embedding.clone(),
            children: Vec::new(),
            parent: None,
            documents: vec![doc.id.clone()],
            metadata: doc.metadata.clone(),
        }
    }

    /// Whether this is a leaf.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.level == 0
    }

    /// Summary if present, else content.
    #[must_use]
    pub fn text(&self) -> &str {
        if self.summary.is_empty() {
            &self.content
        } else {
            &self.summary
        }
    }

    /// The document this leaf was created from.
    #[must_use]
    pub fn to_document(&self) -> Document {
        Document {
            id: self.id.clone(),
            content: self.content.clone(),
            embedding: self.embedding.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Top of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRoot {
    /// The single node left after the last round.
    Node(NodeId),
    /// Structural root over several unmerged top nodes. It has no
    /// embedding and is never scored.
    Aggregate {
        /// Always [`AGGREGATE_ROOT_ID`].
        id: String,
        /// One above the highest populated level.
        level: usize,
        /// Fixed placeholder text.
        summary: String,
        /// The unmerged top nodes.
        children: Vec<NodeId>,
    },
}

/// Level-organized tree of leaves and cluster summaries.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalTree {
    nodes: Vec<Option<TreeNode>>,
    levels: BTreeMap<usize, Vec<NodeId>>,
    root: Option<TreeRoot>,
}

impl HierarchicalTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a live node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    /// Node ids at `level` (empty if the level does not exist).
    #[must_use]
    pub fn level(&self, level: usize) -> &[NodeId] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or_default()
    }

    /// All populated levels, lowest first.
    #[must_use]
    pub const fn levels(&self) -> &BTreeMap<usize, Vec<NodeId>> {
        &self.levels
    }

    /// The root, if the tree has been built.
    #[must_use]
    pub const fn root(&self) -> Option<&TreeRoot> {
        self.root.as_ref()
    }

    /// Number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.level(0).len()
    }

    /// Highest populated level (0 for a leaves-only or empty tree).
    #[must_use]
    pub fn height(&self) -> usize {
        self.levels
            .iter()
            .rev()
            .find(|(_, ids)| !ids.is_empty())
            .map_or(0, |(level, _)| *level)
    }

    /// Whether the tree has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }

    /// Finds a live node by its string id, searching every level.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.levels
            .values()
            .flatten()
            .copied()
            .find(|&n| self.node(n).is_some_and(|node| node.id == id))
    }

    /// Parent of a node, if it has a live one.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<&TreeNode> {
        self.node(id)
            .and_then(|n| n.parent)
            .and_then(|p| self.node(p))
    }

    /// Inserts a leaf for `doc`, replacing the leaf with the same id in place.
    pub fn upsert_leaf(&mut self, doc: &Document) -> NodeId {
        let existing = self
            .level(0)
            .iter()
            .copied()
            .find(|&n| self.node(n).is_some_and(|node| node.id == doc.id));

        if let Some(id) = existing {
            let parent = self.node(id).and_then(|n| n.parent);
            let mut leaf = TreeNode::leaf(doc);
            leaf.parent = parent;
            self.nodes[id] = Some(leaf);
            return id;
        }

        let id = self.push(TreeNode::leaf(doc));
        self.levels.entry(0).or_default().push(id);
        id
    }

    /// Removes every node whose id is in `ids`, on every level.
    ///
    /// Ancestors keep their summaries and embeddings: they are not
    /// recomputed until the next build.
    pub fn remove(&mut self, ids: &BTreeSet<String>) -> usize {
        let mut removed = Vec::new();
        for level in self.levels.values_mut() {
            level.retain(|&n| {
                let keep = self.nodes[n].as_ref().is_none_or(|node| !ids.contains(&node.id));
                if !keep {
                    removed.push(n);
                }
                keep
            });
        }
        for &n in &removed {
            self.nodes[n] = None;
        }
        if let Some(TreeRoot::Node(root)) = self.root
            && self.nodes[root].is_none()
        {
            self.root = None;
        }
        removed.len()
    }

    /// Copy holding only the current leaves, unparented, with no summary
    /// levels and no root. Tombstones are compacted away.
    #[must_use]
    pub fn leaves_only(&self) -> Self {
        let mut tree = Self::new();
        for &n in self.level(0) {
            if let Some(node) = self.node(n) {
                let mut leaf = node.clone();
                leaf.parent = None;
                let id = tree.push(leaf);
                tree.levels.entry(0).or_default().push(id);
            }
        }
        tree
    }

    /// Adds a summary node over `children` and links them to it.
    ///
    /// The node's level is one above its highest child and its document
    /// list is the ordered union of the children's.
    pub fn add_parent(
        &mut self,
        id: String,
        summary: String,
        embedding: Vector,
        children: Vec<NodeId>,
    ) -> NodeId {
        let mut documents = Vec::new();
        let mut seen = BTreeSet::new();
        let mut child_level = 0;
        for &child in &children {
            if let Some(node) = self.node(child) {
                child_level = child_level.max(node.level);
                for doc in &node.documents {
                    if seen.insert(doc.as_str()) {
                        documents.push(doc.clone());
                    }
                }
            }
        }
        let level = child_level + 1;

        let mut metadata = Metadata::new();
        metadata.insert("level".to_string(), level.into());
        metadata.insert("child_count".to_string(), children.len().into());

        let parent = self.push(TreeNode {
            id,
            level,
            content: String::new(),
            summary,
            embedding,
            children: children.clone(),
            parent: None,
            documents,
            metadata,
        });
        for child in children {
            if let Some(Some(node)) = self.nodes.get_mut(child) {
                node.parent = Some(parent);
            }
        }
        parent
    }

    /// Records the node set of a summary level.
    pub fn set_level(&mut self, level: usize, ids: Vec<NodeId>) {
        self.levels.insert(level, ids);
    }

    /// Sets the root from the nodes left after the last round: one node
    /// becomes the root, several get an aggregator, none clears it.
    pub fn set_root(&mut self, top: &[NodeId]) {
        self.root = match top {
            [] => None,
            [single] => Some(TreeRoot::Node(*single)),
            many => Some(TreeRoot::Aggregate {
                id: AGGREGATE_ROOT_ID.to_string(),
                level: self.height() + 1,
                summary: "Root node".to_string(),
                children: many.to_vec(),
            }),
        };
    }

    /// Ranks leaves against `query`.
    ///
    /// Levels are scanned from the highest down. Every leaf is a candidate.
    /// A summary node scoring above `threshold` adds its leaf descendants,
    /// descending only through summaries that also score above it. The
    /// candidates are sorted by score, de-duplicated by id, and cut to
    /// `limit`.
    #[must_use]
    pub fn search(&self, query: &[f32], threshold: f32, limit: usize) -> Vec<(NodeId, f32)> {
        let mut hits = Vec::new();
        for (&level, ids) in self.levels.iter().rev() {
            for &id in ids {
                let Some(node) = self.node(id) else {
                    continue;
                };
                let score = cosine_similarity(query, &node.embedding);
                if level == 0 {
                    hits.push((id, score));
                } else if score > threshold {
                    self.collect_descendants(node, query, threshold, &mut hits);
                }
            }
        }

        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        let mut seen = BTreeSet::new();
        hits.retain(|&(id, _)| self.node(id).is_some_and(|n| seen.insert(n.id.as_str())));
        hits.truncate(limit);
        hits
    }

    fn collect_descendants(
        &self,
        node: &TreeNode,
        query: &[f32],
        threshold: f32,
        hits: &mut Vec<(NodeId, f32)>,
    ) {
        for &child_id in &node.children {
            let Some(child) = self.node(child_id) else {
                continue;
            };
            let score = cosine_similarity(query, &child.embedding);
            if child.is_leaf() {
                hits.push((child_id, score));
            } else if score > threshold {
                self.collect_descendants(child, query, threshold, hits);
            }
        }
    }

    /// Serializable view of the tree.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        let view = |n: NodeId| self.node(n).map(|node| self.node_view(node));
        let root = self.root.as_ref().and_then(|root| match root {
            TreeRoot::Node(n) => view(*n),
            TreeRoot::Aggregate {
                id,
                level,
                summary,
                children,
            } => Some(NodeView {
                id: id.clone(),
                level: *level,
                text: summary.clone(),
                children: self.child_ids(children),
                documents: Vec::new(),
            }),
        });
        let levels = self
            .levels
            .iter()
            .map(|(&level, ids)| (level, ids.iter().filter_map(|&n| view(n)).collect()))
            .collect();
        TreeSnapshot { root, levels }
    }

    /// Node count per level.
    #[must_use]
    pub fn stats(&self) -> Vec<LevelStats> {
        self.levels
            .iter()
            .map(|(&level, ids)| LevelStats {
                level,
                nodes: ids.iter().filter(|&&n| self.node(n).is_some()).count(),
            })
            .collect()
    }

    fn node_view(&self, node: &TreeNode) -> NodeView {
        NodeView {
            id: node.id.clone(),
            level: node.level,
            text: truncate(node.text(), NODE_VIEW_TEXT_LEN),
            children: self.child_ids(&node.children),
            documents: node.documents.clone(),
        }
    }

    fn child_ids(&self, children: &[NodeId]) -> Vec<String> {
        children
            .iter()
            .filter_map(|&c| self.node(c).map(|n| n.id.clone()))
            .collect()
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        self.nodes.push(Some(node));
        self.nodes.len() - 1
    }
}

const NODE_VIEW_TEXT_LEN: usize = 120;

/// Node count of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    /// Level number.
    pub level: usize,
    /// Live nodes on the level.
    pub nodes: usize,
}

/// One node in a [`TreeSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    /// Node id.
    pub id: String,
    /// Node level.
    pub level: usize,
    /// Leaf content or summary, truncated.
    pub text: String,
    /// Child ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Source document ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<String>,
}

/// Diagnostic view of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    /// The root node, if any.
    pub root: Option<NodeView>,
    /// Nodes per level.
    pub levels: BTreeMap<usize, Vec<NodeView>>,
}
