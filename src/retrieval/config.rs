//! Retrieval tree configuration.
//!
//! Resolved in order: explicit builder values → environment variables →
//! defaults.

use crate::error::RetrievalError;

/// Default maximum tree depth above the leaves.
pub const DEFAULT_MAX_LEVELS: usize = 3;
/// Default target cluster size.
pub const DEFAULT_CLUSTER_SIZE: usize = 5;
/// Default similarity threshold for clustering and search descent.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;
/// Default branching limit.
pub const DEFAULT_MAX_CHILDREN_PER_NODE: usize = 10;

/// Configuration for [`RaptorStore`](super::RaptorStore).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaptorConfig {
    /// Maximum number of summary levels built above the leaves.
    pub max_levels: usize,
    /// Target number of nodes per cluster.
    pub cluster_size: usize,
    /// Cosine similarity a node needs to join a cluster seed, and that a
    /// summary node must exceed for search to descend into it.
    pub similarity_threshold: f32,
    /// Hard limit on the children of one summary node.
    pub max_children_per_node: usize,
}

impl Default for RaptorConfig {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
            cluster_size: DEFAULT_CLUSTER_SIZE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_children_per_node: DEFAULT_MAX_CHILDREN_PER_NODE,
        }
    }
}

impl RaptorConfig {
    /// Creates a new builder for `RaptorConfig`.
    #[must_use]
    pub fn builder() -> RaptorConfigBuilder {
        RaptorConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidConfig`] if a value is out of range.
    pub fn from_env() -> Result<Self, RetrievalError> {
        Self::builder().from_env().build()
    }

    /// Largest cluster the tree will form: the smaller of `cluster_size`
    /// and `max_children_per_node`.
    #[must_use]
    pub fn cluster_capacity(&self) -> usize {
        self.cluster_size.min(self.max_children_per_node).max(1)
    }

    /// Checks every field's range.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.max_levels == 0 {
            return Err(invalid("max_levels", "must be at least 1"));
        }
        if self.cluster_size == 0 {
            return Err(invalid("cluster_size", "must be at least 1"));
        }
        if self.max_children_per_node == 0 {
            return Err(invalid("max_children_per_node", "must be at least 1"));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(invalid(
                "similarity_threshold",
                &format!("must be in (0, 1], got {}", self.similarity_threshold),
            ));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, message: &str) -> RetrievalError {
    RetrievalError::InvalidConfig {
        name,
        message: message.to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Builder for [`RaptorConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RaptorConfigBuilder {
    max_levels: Option<usize>,
    cluster_size: Option<usize>,
    similarity_threshold: Option<f32>,
    max_children_per_node: Option<usize>,
}

impl RaptorConfigBuilder {
    /// Populates unset fields from `AGENTREE_RAPTOR_*` environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.max_levels.is_none() {
            self.max_levels = env_parse("AGENTREE_RAPTOR_MAX_LEVELS");
        }
        if self.cluster_size.is_none() {
            self.cluster_size = env_parse("AGENTREE_RAPTOR_CLUSTER_SIZE");
        }
        if self.similarity_threshold.is_none() {
            self.similarity_threshold = env_parse("AGENTREE_RAPTOR_SIMILARITY_THRESHOLD");
        }
        if self.max_children_per_node.is_none() {
            self.max_children_per_node = env_parse("AGENTREE_RAPTOR_MAX_CHILDREN");
        }
        self
    }

    /// Sets the maximum tree depth.
    #[must_use]
    pub const fn max_levels(mut self, n: usize) -> Self {
        self.max_levels = Some(n);
        self
    }

    /// Sets the target cluster size.
    #[must_use]
    pub const fn cluster_size(mut self, n: usize) -> Self {
        self.cluster_size = Some(n);
        self
    }

    /// Sets the similarity threshold.
    #[must_use]
    pub const fn similarity_threshold(mut self, t: f32) -> Self {
        self.similarity_threshold = Some(t);
        self
    }

    /// Sets the branching limit.
    #[must_use]
    pub const fn max_children_per_node(mut self, n: usize) -> Self {
        self.max_children_per_node = Some(n);
        self
    }

    /// Builds and validates the [`RaptorConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidConfig`] if a value is out of range.
    pub fn build(self) -> Result<RaptorConfig, RetrievalError> {
        let config = RaptorConfig {
            max_levels: self.max_levels.unwrap_or(DEFAULT_MAX_LEVELS),
            cluster_size: self.cluster_size.unwrap_or(DEFAULT_CLUSTER_SIZE),
            similarity_threshold: self
                .similarity_threshold
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            max_children_per_node: self
                .max_children_per_node
                .unwrap_or(DEFAULT_MAX_CHILDREN_PER_NODE),
        };
        config.validate()?;
        Ok(config)
    }
}
