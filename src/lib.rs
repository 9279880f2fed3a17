//! # agentree
//!
//! Multi-agent task orchestration and RAPTOR-style hierarchical retrieval
//! for LLM applications.
//!
//! ## Overview
//!
//! - [`agent::TaskOrchestrator`] asks a planner model to break a query into
//!   subtasks with dependencies, runs them level by level on a bounded pool
//!   of [`agent::WorkerAgent`]s, and has a synthesizer model combine the
//!   results.
//! - [`retrieval::RaptorStore`] keeps documents as leaves of a tree whose
//!   upper levels are summaries of similarity clusters, and searches it
//!   top-down with optional parent-context expansion.
//!
//! Model access goes through the [`agent::LlmProvider`],
//! [`embedding::Embedder`] and [`retrieval::Summarizer`] traits. The
//! `openai` feature enables an OpenAI-compatible implementation of the
//! first two; [`embedding::HashEmbedder`] and
//! [`retrieval::ConcatSummarizer`] work offline.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agentree::embedding::{Document, HashEmbedder};
//! use agentree::retrieval::{ConcatSummarizer, MemoryStore, RaptorConfig, RaptorStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> agentree::Result<()> {
//! let store = RaptorStore::new(
//!     MemoryStore::new(),
//!     Arc::new(HashEmbedder::default()),
//!     Arc::new(ConcatSummarizer),
//!     RaptorConfig::default(),
//! )?;
//! let cancel = CancellationToken::new();
//! store
//!     .add_texts(vec![Document::new("intro", "Trees of summaries")], &cancel)
//!     .await?;
//! let hits = store.search_with_context("summaries", 5, &cancel).await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod embedding;
pub mod error;
pub mod retrieval;

pub use error::{AgentError, Error, Result, RetrievalError};
