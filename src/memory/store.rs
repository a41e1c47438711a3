//! Write path — embedding, deduplication, timestamp injection, upsert.
//!
//! [`Engine::add`] is the single entry point. Near-duplicates of the incoming
//! vector are deleted before the upsert (pinned entries excepted), and the
//! earliest `created_at` among them survives onto the new entry, so repeated
//! rephrasings collapse into one memory that keeps its original lineage.

use anyhow::Result;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::types::{
    is_pinned, oldest_created_at, validate_text_payload, AddInput, AddOptions, AddOutcome,
    MemoryHit, DEDUP_CANDIDATES, DEDUP_THRESHOLD,
};
use super::{now_rfc3339, Engine};

impl Engine {
    /// Store a memory and return its id, plus the ids of any duplicates it
    /// replaced.
    pub async fn add(&self, input: AddInput, opts: AddOptions) -> Result<AddOutcome> {
        let AddOptions {
            id,
            mut payload,
            pinned,
            no_merge,
        } = opts;

        // 1. Resolve the vector. Text mode embeds and stores the original
        //    text; vector mode requires the caller to have supplied it.
        let vector = match input {
            AddInput::Text(text) => {
                let vector = self.embed(&text).await?;
                payload.insert("text".to_string(), Value::String(text));
                vector
            }
            AddInput::Vector(vector) => {
                validate_text_payload(&payload)?;
                vector
            }
        };

        if pinned && !payload.contains_key("pinned") {
            payload.insert("pinned".to_string(), Value::Bool(true));
        }

        // 2. Merge near-duplicates. The earliest created_at among the
        //    replaced entries becomes this entry's origin.
        let merged = if no_merge {
            Vec::new()
        } else {
            self.dedup_and_delete(&vector).await
        };
        if let Some(created_at) = oldest_created_at(&merged) {
            payload.insert("created_at".to_string(), Value::String(created_at));
        }

        // 3. Inject timestamps. last_accessed always moves to now;
        //    created_at is set only when nothing preserved it above.
        let now = now_rfc3339();
        payload.insert("last_accessed".to_string(), Value::String(now.clone()));
        payload
            .entry("created_at".to_string())
            .or_insert(Value::String(now));

        // 4. Upsert. The collection's width is fixed by the first vector
        //    ever stored.
        self.index.ensure_collection(vector.len() as u64).await?;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.index.upsert(&id, vector, payload).await?;

        let (merged_ids, merged_id) = if merged.is_empty() {
            (None, None)
        } else {
            let ids: Vec<String> = merged.iter().map(|hit| hit.id.clone()).collect();
            let first = ids.first().cloned();
            (Some(ids), first)
        };
        Ok(AddOutcome {
            id,
            merged_ids,
            merged_id,
        })
    }

    /// Find existing memories at or above the dedup threshold and delete
    /// them, collecting what was removed. Pinned entries are immune. Every
    /// failure here is non-fatal: a dedup problem must never block a store,
    /// so the add proceeds as if no duplicates existed.
    async fn dedup_and_delete(&self, vector: &[f32]) -> Vec<MemoryHit> {
        let candidates = match self
            .index
            .query(vector.to_vec(), DEDUP_THRESHOLD, DEDUP_CANDIDATES)
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!("dedup search failed, storing without merge: {err:#}");
                return Vec::new();
            }
        };

        let mut deleted = Vec::new();
        for old in candidates {
            if is_pinned(&old.payload) {
                continue;
            }
            if let Err(err) = self.index.delete(vec![old.id.clone()]).await {
                warn!(id = %old.id, "dedup delete failed, skipping: {err:#}");
                continue;
            }
            deleted.push(MemoryHit::from(old));
        }
        deleted
    }
}
