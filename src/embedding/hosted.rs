//! Hosted embedding providers (hosted-A, hosted-B): blocking HTTP calls
//! with retry/backoff on 5xx and network errors. `reqwest`'s `blocking`
//! client manages its own internal runtime, so the public provider
//! surface stays fully synchronous like the rest of the engine. Retry
//! discipline is modeled on the teacher's WAL fsync-retry shape,
//! generalized to 3 attempts with exponential backoff.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind, Result};
use crate::embedding::provider::{l2_normalize, EmbeddingProvider};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostedVariant {
    A,
    B,
}

impl HostedVariant {
    fn dimension(self) -> usize {
        match self {
            HostedVariant::A => 1536,
            HostedVariant::B => 4096,
        }
    }

    fn provider_id(self) -> &'static str {
        match self {
            HostedVariant::A => "hosted-a",
            HostedVariant::B => "hosted-b",
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct HostedEmbeddingProvider {
    variant: HostedVariant,
    endpoint: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HostedEmbeddingProvider {
    pub fn new(variant: HostedVariant, endpoint: String, api_key: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("building the hosted embedding http client");

        HostedEmbeddingProvider { variant, endpoint, api_key, client }
    }

    fn call_once(&self, text: &str) -> std::result::Result<Vec<f32>, CallError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest { input: text })
            .send()
            .map_err(|_| CallError::Network)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CallError::Network);
        }
        if !status.is_success() {
            return Err(CallError::Fatal(format!("embedding provider returned {}", status)));
        }

        let body: EmbedResponse = response.json().map_err(|e| CallError::Fatal(e.to_string()))?;
        Ok(body.embedding)
    }
}

enum CallError {
    Network,
    Fatal(String),
}

impl EmbeddingProvider for HostedEmbeddingProvider {
    fn embed_text(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self.call_once(text) {
                Ok(mut vector) => {
                    l2_normalize(&mut vector);
                    return Ok(Some(vector));
                }
                Err(CallError::Fatal(message)) => {
                    log::warn!("{} embedding call failed: {}", self.variant.provider_id(), message);
                    return Ok(None);
                }
                Err(CallError::Network) => {
                    last_error = Some(());
                    if attempt + 1 < MAX_ATTEMPTS {
                        thread::sleep(BASE_BACKOFF * 2u32.pow(attempt));
                    }
                }
            }
        }

        log::warn!("{} embedding provider unreachable after {} attempts", self.variant.provider_id(), MAX_ATTEMPTS);
        let _ = last_error;
        Ok(None)
    }

    fn dimension(&self) -> usize {
        self.variant.dimension()
    }

    fn provider_id(&self) -> &'static str {
        self.variant.provider_id()
    }

    fn clone_box(&self) -> Box<dyn EmbeddingProvider> {
        Box::new(HostedEmbeddingProvider::new(self.variant, self.endpoint.clone(), self.api_key.clone()))
    }
}

/// Surfaces a configuration error (missing API key) up front rather than
/// on first embed call.
pub fn require_api_key(variant: HostedVariant, api_key: Option<String>) -> Result<String> {
    api_key.ok_or_else(|| {
        Error::new(
            ErrorKind::ValidationFailure,
            format!("{} requires an API key", variant.provider_id()),
        )
    })
}
