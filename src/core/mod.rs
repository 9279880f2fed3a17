//! Small shared building blocks used by both the agent and retrieval layers.

pub mod cancel;
pub mod similarity;
pub mod text;

pub use cancel::run_cancellable;
pub use similarity::cosine_similarity;
pub use text::truncate;
