//! Hierarchical retrieval (RAPTOR).
//!
//! ## Architecture
//!
//! ```text
//! Documents ──► VectorStore (flat)        search_text / search_with_context
//!     │                                           │
//!     └──► leaves ──► greedy_clusters ──► Summarizer ──► Embedder
//!                          ▲                                  │
//!                          └──────── next level ◄─────────────┘
//! ```
//!
//! - [`RaptorStore`] owns the base store and the [`HierarchicalTree`] under
//!   one lock and rebuilds the summary levels on every add.
//! - [`greedy_clusters`] groups a level's nodes by similarity to a seed.
//! - [`Summarizer`] turns a cluster's texts into the parent's text:
//!   [`ConcatSummarizer`] offline, [`LlmSummarizer`] through a chat model.

pub mod cluster;
pub mod config;
pub mod raptor;
pub mod store;
pub mod summarizer;
pub mod tree;

pub use cluster::greedy_clusters;
pub use config::{RaptorConfig, RaptorConfigBuilder};
pub use raptor::RaptorStore;
pub use store::{
    DEFAULT_SEARCH_LIMIT, MemoryStore, SearchResult, VectorStore, has_metadata, metadata_equals,
};
pub use summarizer::{ConcatSummarizer, LlmSummarizer, Summarizer};
pub use tree::{HierarchicalTree, LevelStats, NodeId, NodeView, TreeNode, TreeRoot, TreeSnapshot};
