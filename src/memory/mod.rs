//! Core memory engine — the lifecycle layer over the vector index.
//!
//! The write path ([`store`]) owns deduplication, pinning, and timestamp
//! injection; the read path ([`search`]) owns ranking and access tracking;
//! decay and connectivity checks live in [`forget`]. Type definitions are in
//! [`types`].
//!
//! An [`Engine`] owns its connections for the duration of one invocation.
//! There is no shared state between calls: everything durable lives in the
//! index.

pub mod forget;
pub mod search;
pub mod store;
pub mod types;

pub use types::{AddInput, AddOptions, AddOutcome, MemoryHit, SearchOptions};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};

use crate::embedding::OllamaClient;
use crate::index::Index;

/// One invocation's session over the vector index and the embedding service.
pub struct Engine {
    pub(crate) index: Index,
    pub(crate) embedder: OllamaClient,
    pub(crate) model: String,
}

impl Engine {
    pub fn new(index: Index, embedder: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            index,
            embedder,
            model: model.into(),
        }
    }

    /// Embed text with the configured model.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(&self.model, text)
            .await
            .context("embedding failed")
    }
}

/// Current UTC time as RFC 3339 with nanosecond precision. Sub-second
/// precision matters: dedup tests add twice within the same second and the
/// preserved `created_at` must still compare as the earlier one.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
