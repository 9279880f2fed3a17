//! Offline feature-hashing embedder.

use async_trait::async_trait;
use rayon::prelude::*;
use unicode_segmentation::UnicodeSegmentation;

use super::{Embedder, Vector};
use crate::error::RetrievalError;

/// Default dimension for [`HashEmbedder`].
pub const DEFAULT_HASH_DIMENSION: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic bag-of-words embedder.
///
/// Lowercased unicode words are hashed (FNV-1a) into `dimension` buckets with
/// a sign bit taken from the hash, then the vector is L2-normalised. Texts
/// sharing vocabulary land close together, which is enough for local search
/// and for exercising the tree without a network model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Creates an embedder with the given output dimension.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidConfig`] when `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self, RetrievalError> {
        if dimension == 0 {
            return Err(RetrievalError::InvalidConfig {
                name: "dimension",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self { dimension })
    }

    /// Embeds synchronously.
    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vector {
        let mut v = vec![0.0_f32; self.dimension];
        for word in text.unicode_words() {
            let h = fnv1a(&word.to_lowercase());
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector, RetrievalError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, RetrievalError> {
        Ok(texts.par_iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "fnv1a-hash"
    }
}
