//! Deterministic hash-projection embedder, grounded on the pack's
//! `HasherEmbeddingService` (djb2 hash seeding a linear congruential
//! generator, then L2-normalized).

use crate::core::error::Result;
use crate::embedding::provider::{l2_normalize, EmbeddingProvider};

pub struct MockEmbeddingProvider {
    dim: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        MockEmbeddingProvider { dim: dimension }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        MockEmbeddingProvider::new(384)
    }
}

impl EmbeddingProvider for MockEmbeddingProvider {
    fn embed_text(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let mut hash: u32 = 5381;
        for byte in text.as_bytes() {
            hash = hash.wrapping_mul(33).wrapping_add(*byte as u32);
        }

        let mut state = hash;
        let mut vector = vec![0.0f32; self.dim];
        for value in vector.iter_mut() {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            *value = ((state as f32 / u32::MAX as f32) - 0.5) * 2.0;
        }

        l2_normalize(&mut vector);
        Ok(Some(vector))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn provider_id(&self) -> &'static str {
        "mock"
    }

    fn clone_box(&self) -> Box<dyn EmbeddingProvider> {
        Box::new(MockEmbeddingProvider::new(self.dim))
    }
}
