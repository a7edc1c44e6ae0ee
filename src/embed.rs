//! Talks to the text-embeddings service.
//!
//! The model encodes queries and documents asymmetrically, so every caller
//! must declare which side it is on; the two entry points differ only in
//! the prefix prepended before encoding.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::error::MnemoError;

const DEFAULT_EMBED_URL: &str = "http://localhost:8080/embed";
const QUERY_PREFIX: &str = "search_query: ";
const DOCUMENT_PREFIX: &str = "search_document: ";
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can turn text into a dense vector. The HTTP client below
/// is the real one; tests substitute a deterministic stub.
pub trait Embedder: Send + Sync {
    fn embed_query(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, MnemoError>> + Send;

    fn embed_document(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, MnemoError>> + Send;
}

#[derive(Clone)]
pub struct EmbedClient {
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a str,
}

impl EmbedClient {
    /// Resolve the endpoint once at startup; `MNEMO_EMBED_URL` overrides
    /// the default.
    pub fn from_env() -> Self {
        Self::new(std::env::var("MNEMO_EMBED_URL").unwrap_or_else(|_| DEFAULT_EMBED_URL.into()))
    }

    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { url: url.into(), client }
    }

    async fn embed_with_prefix(&self, text: String) -> Result<Vec<f32>, MnemoError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { inputs: &text })
            .send()
            .await
            .map_err(|e| MnemoError::EmbedUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MnemoError::EmbedUnavailable(format!(
                "embedding service returned {}",
                resp.status()
            )));
        }

        // The service returns [[f32, ...]] for a single input.
        let body: Vec<Vec<f32>> = resp.json().await.map_err(|_| MnemoError::NoEmbedding)?;
        body.into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(MnemoError::NoEmbedding)
    }
}

impl Embedder for EmbedClient {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MnemoError> {
        self.embed_with_prefix(format!("{QUERY_PREFIX}{text}")).await
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, MnemoError> {
        self.embed_with_prefix(format!("{DOCUMENT_PREFIX}{text}")).await
    }
}
