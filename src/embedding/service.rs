//! Process-wide embedding service: selects a provider variant from
//! configuration and exposes the `embedText`/`embedNode` contract.
//!
//! Caches recent lookups the way the teacher's `query::cache::QueryCache`
//! caches search results: a bounded LRU behind a lock, with hit/miss
//! counters exposed for `Engine::stats`. A hosted provider call is the
//! only potentially slow path here, so the cache is keyed on the raw
//! input text rather than anything content-derived.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::core::config::{Config, EmbedProvider};
use crate::core::error::Result;
use crate::embedding::hosted::{require_api_key, HostedEmbeddingProvider, HostedVariant};
use crate::embedding::local::LocalEmbeddingProvider;
use crate::embedding::mock::MockEmbeddingProvider;
use crate::embedding::none::NoneEmbeddingProvider;
use crate::embedding::provider::EmbeddingProvider;

const CACHE_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingCacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct EmbeddingService {
    provider: Box<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Option<Vec<f32>>>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl EmbeddingService {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider: Box<dyn EmbeddingProvider> = match config.embed_provider {
            EmbedProvider::Local => Box::new(LocalEmbeddingProvider::new()),
            EmbedProvider::Mock => Box::new(MockEmbeddingProvider::default()),
            EmbedProvider::None => Box::new(NoneEmbeddingProvider),
            EmbedProvider::HostedA => {
                let api_key = require_api_key(HostedVariant::A, config.hosted_a_api_key.clone())?;
                Box::new(HostedEmbeddingProvider::new(
                    HostedVariant::A,
                    "https://api.hosted-a.example/v1/embeddings".to_string(),
                    api_key,
                ))
            }
            EmbedProvider::HostedB => {
                let api_key = require_api_key(HostedVariant::B, config.hosted_b_api_key.clone())?;
                Box::new(HostedEmbeddingProvider::new(
                    HostedVariant::B,
                    "https://api.hosted-b.example/v1/embeddings".to_string(),
                    api_key,
                ))
            }
        };

        Ok(EmbeddingService {
            provider,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        })
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.provider_id()
    }

    pub fn cache_stats(&self) -> EmbeddingCacheStats {
        EmbeddingCacheStats {
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
        }
    }

    /// On provider error or outage, returns `Ok(None)` and logs a
    /// warning; capture must never fail because an embedding provider
    /// is unavailable.
    pub fn embed_text(&self, text: &str) -> Result<Option<Vec<f32>>> {
        if let Some(cached) = self.cache.lock().get(text) {
            self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Ok(cached.clone());
        }
        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let result = match self.provider.embed_text(text) {
            Ok(vector) => vector,
            Err(err) => {
                log::warn!("embedding provider {} failed: {}", self.provider.provider_id(), err);
                None
            }
        };

        self.cache.lock().put(text.to_string(), result.clone());
        Ok(result)
    }

    pub fn embed_node(&self, title: &str, body: &str) -> Result<Option<Vec<f32>>> {
        self.embed_text(&format!("{}\n{}", title, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_embeds_and_normalizes() {
        let mut config = Config::default();
        config.embed_provider = EmbedProvider::Mock;
        let service = EmbeddingService::from_config(&config).unwrap();

        let vector = service.embed_node("Title", "Body text").unwrap().unwrap();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn repeat_lookup_hits_cache() {
        let mut config = Config::default();
        config.embed_provider = EmbedProvider::Mock;
        let service = EmbeddingService::from_config(&config).unwrap();

        service.embed_text("repeated text").unwrap();
        service.embed_text("repeated text").unwrap();

        let stats = service.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn none_provider_always_returns_none() {
        let mut config = Config::default();
        config.embed_provider = EmbedProvider::None;
        let service = EmbeddingService::from_config(&config).unwrap();
        assert!(service.embed_text("anything").unwrap().is_none());
    }

    #[test]
    fn hosted_without_api_key_fails_fast() {
        let mut config = Config::default();
        config.embed_provider = EmbedProvider::HostedA;
        assert!(EmbeddingService::from_config(&config).is_err());
    }
}
