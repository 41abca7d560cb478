//! Pure-lexical mode: always reports "no embedding".

use crate::core::error::Result;
use crate::embedding::provider::EmbeddingProvider;

pub struct NoneEmbeddingProvider;

impl EmbeddingProvider for NoneEmbeddingProvider {
    fn embed_text(&self, _text: &str) -> Result<Option<Vec<f32>>> {
        Ok(None)
    }

    fn dimension(&self) -> usize {
        0
    }

    fn provider_id(&self) -> &'static str {
        "none"
    }

    fn clone_box(&self) -> Box<dyn EmbeddingProvider> {
        Box::new(NoneEmbeddingProvider)
    }
}
