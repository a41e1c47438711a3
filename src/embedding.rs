//! Embedding adapter — a thin client for Ollama's embed endpoint.
//!
//! One call, one vector: `POST /api/embed` with a model name and an input
//! string. Ollama answers with f64 components; they are downcast to f32,
//! which is the width the vector index stores.

use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Client for a running Ollama instance.
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f64>>,
}

impl OllamaClient {
    /// Create a client. `base_url` is typically `http://localhost:11434`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Embed a single text with the given model.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest { model, input: text })
            .send()
            .await
            .context("ollama request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("ollama returned {status}: {body}");
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .context("decode ollama response")?;
        first_embedding(parsed)
    }

    /// Liveness probe against the Ollama root endpoint.
    pub async fn health(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .with_context(|| {
                format!("cannot reach ollama at {}, is it running?", self.base_url)
            })?;
        ensure!(
            response.status().is_success(),
            "ollama returned status {}",
            response.status()
        );
        Ok(())
    }
}

/// Pull the first vector out of an embed response, downcast to f32.
/// An empty result is an error: storing a zero-width vector would poison
/// the collection's width.
fn first_embedding(response: EmbedResponse) -> Result<Vec<f32>> {
    match response.embeddings.into_iter().next() {
        Some(embedding) if !embedding.is_empty() => {
            Ok(embedding.into_iter().map(|v| v as f32).collect())
        }
        _ => bail!("ollama returned empty embeddings"),
    }
}
