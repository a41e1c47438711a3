//! Read path — point lookup, similarity search, access tracking, and the
//! optional recency boost.

use std::cmp::Ordering;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use super::types::{MemoryHit, SearchOptions};
use super::{now_rfc3339, Engine};

impl Engine {
    /// Fetch a single memory by id. `None` when the id (or the whole
    /// collection) is absent. A successful read bumps `last_accessed`.
    pub async fn get(&self, id: &str) -> Result<Option<MemoryHit>> {
        let Some(point) = self.index.get(id).await? else {
            return Ok(None);
        };
        let hit = MemoryHit::from(point);
        // Patch after the payload is captured, so a patch failure cannot
        // affect what the caller sees.
        self.touch(&hit.id).await;
        Ok(Some(hit))
    }

    /// Similarity search over the collection. Results come back
    /// score-descending; each returned hit's `last_accessed` is bumped.
    pub async fn search(&self, vector: Vec<f32>, opts: &SearchOptions) -> Result<Vec<MemoryHit>> {
        let points = self
            .index
            .query(vector, opts.min_score, opts.limit)
            .await?;
        let mut hits: Vec<MemoryHit> = points.into_iter().map(MemoryHit::from).collect();

        if opts.recency_weight != 0.0 {
            let now = Utc::now();
            for hit in &mut hits {
                hit.score = boosted_score(
                    hit.score,
                    hit.payload.get("created_at").and_then(Value::as_str),
                    now,
                    opts.recency_weight,
                    opts.recency_scale,
                );
            }
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        }

        for hit in &hits {
            self.touch(&hit.id).await;
        }
        Ok(hits)
    }

    /// Best-effort `last_accessed` update. A recall that returned data is a
    /// successful recall; a failed timestamp patch is logged and dropped.
    async fn touch(&self, id: &str) {
        let mut patch = Map::new();
        patch.insert(
            "last_accessed".to_string(),
            Value::String(now_rfc3339()),
        );
        if let Err(err) = self.index.patch_payload(id, patch).await {
            warn!(id = %id, "failed to update last_accessed: {err:#}");
        }
    }
}

/// `similarity + weight * 2^(-age/scale)`, with age in seconds since the
/// entry was created. Additive and unclamped: a boosted score may exceed 1.0
/// and the confidence thresholds apply to it unchanged. An entry without a
/// parseable `created_at` keeps its plain similarity.
fn boosted_score(
    similarity: f32,
    created_at: Option<&str>,
    now: DateTime<Utc>,
    weight: f64,
    scale: f64,
) -> f32 {
    if scale <= 0.0 {
        return similarity;
    }
    let Some(created_at) = created_at else {
        return similarity;
    };
    let Ok(created) = DateTime::parse_from_rfc3339(created_at) else {
        return similarity;
    };
    let age_seconds =
        ((now - created.with_timezone(&Utc)).num_milliseconds() as f64 / 1000.0).max(0.0);
    (similarity as f64 + weight * (-age_seconds / scale).exp2()) as f32
}
