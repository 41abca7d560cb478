//! Local embedding provider. The pack carries no on-device model runtime
//! to ground a real inference path on without fabricating a dependency
//! (see DESIGN.md), so this reuses the deterministic hash-projection
//! technique at the local provider's dimension; swapping in a real model
//! means replacing `embed_text` without touching callers.

use crate::core::error::Result;
use crate::embedding::mock::MockEmbeddingProvider;
use crate::embedding::provider::EmbeddingProvider;

pub const LOCAL_DIMENSION: usize = 384;

pub struct LocalEmbeddingProvider {
    inner: MockEmbeddingProvider,
}

impl LocalEmbeddingProvider {
    pub fn new() -> Self {
        LocalEmbeddingProvider {
            inner: MockEmbeddingProvider::new(LOCAL_DIMENSION),
        }
    }
}

impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed_text(&self, text: &str) -> Result<Option<Vec<f32>>> {
        self.inner.embed_text(text)
    }

    fn dimension(&self) -> usize {
        LOCAL_DIMENSION
    }

    fn provider_id(&self) -> &'static str {
        "local"
    }

    fn clone_box(&self) -> Box<dyn EmbeddingProvider> {
        Box::new(LocalEmbeddingProvider::new())
    }
}
