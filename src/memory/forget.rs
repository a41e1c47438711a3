//! Decay, single-id deletion, and the end-to-end connectivity check.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use super::Engine;
use crate::index::Index;

impl Engine {
    /// Delete memories whose `last_accessed` predates `now - ttl`. Pinned
    /// entries are immune. Returns the number deleted; zero when the
    /// collection does not exist yet, so forgetting an empty memory is
    /// idempotent rather than an error.
    pub async fn forget(&self, ttl: Duration) -> Result<usize> {
        if !self.index.exists().await? {
            return Ok(0);
        }

        let cutoff = Utc::now() - chrono::Duration::from_std(ttl).context("ttl out of range")?;
        let ids = self.index.scroll_ids(Index::stale_filter(cutoff)).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let count = ids.len();
        self.index.delete(ids).await?;
        Ok(count)
    }

    /// Remove a single memory. Removing an absent id is a no-op.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.index.exists().await? {
            return Ok(());
        }
        self.index.delete(vec![id.to_string()]).await
    }

    /// Verify both backing services: a full round trip against Qdrant and a
    /// liveness probe against Ollama.
    pub async fn check(&self) -> Result<()> {
        self.index.check().await.context("qdrant")?;
        self.embedder.health().await.context("ollama")?;
        Ok(())
    }
}
