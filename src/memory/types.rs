//! Engine type definitions: inputs, outcomes, and the small pure rules
//! (confidence bands, payload validation, lineage selection) the operations
//! are built from.

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::index::Point;

/// Minimum cosine similarity at which an existing memory counts as a
/// duplicate of incoming content. Tight enough that semantically equivalent
/// rephrasings collapse while paraphrases with different intent stay
/// distinct. A constant, not a tuning knob.
pub const DEDUP_THRESHOLD: f32 = 0.92;

/// How many duplicate candidates one add will consider.
pub(crate) const DEDUP_CANDIDATES: u64 = 64;

/// Default decay scale for the recency boost: one week, in seconds.
pub const DEFAULT_RECENCY_SCALE: f64 = 604_800.0;

/// A single recalled memory.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryHit {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
}

impl From<Point> for MemoryHit {
    fn from(point: Point) -> Self {
        Self {
            id: point.id,
            score: point.score,
            payload: point.payload,
        }
    }
}

/// Result of an add: the stored id, plus the duplicates it replaced.
#[derive(Debug, Serialize)]
pub struct AddOutcome {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_ids: Option<Vec<String>>,
    /// First (most similar) replaced duplicate, kept for callers that
    /// predate the list form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_id: Option<String>,
}

/// What to store: raw text to be embedded, or a caller-supplied vector.
pub enum AddInput {
    Text(String),
    Vector(Vec<f32>),
}

/// Knobs for an add.
#[derive(Debug, Default)]
pub struct AddOptions {
    /// Identity for the point; generated when absent. A supplied id
    /// replaces any existing entry with that id.
    pub id: Option<String>,
    /// Extra metadata stored alongside the text.
    pub payload: Map<String, Value>,
    /// Protect the entry from decay and dedup-merge.
    pub pinned: bool,
    /// Skip deduplication entirely.
    pub no_merge: bool,
}

/// Knobs for a search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub min_score: f32,
    pub limit: u64,
    /// Weight of the additive recency boost; zero disables it and makes the
    /// ranking bit-identical to plain cosine.
    pub recency_weight: f64,
    /// Decay scale of the boost, in seconds.
    pub recency_scale: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            limit: 1,
            recency_weight: 0.0,
            recency_scale: DEFAULT_RECENCY_SCALE,
        }
    }
}

/// Qualitative label for the top result score, so agents can gauge whether
/// results are trustworthy without interpreting raw similarities.
pub fn confidence(results: &[MemoryHit]) -> &'static str {
    let Some(top) = results.first() else {
        return "none";
    };
    if top.score >= 0.7 {
        "high"
    } else if top.score >= 0.4 {
        "medium"
    } else {
        "low"
    }
}

/// A vector-mode add must carry displayable content: a memory without text
/// is a ghost that pollutes retrieval results.
pub(crate) fn validate_text_payload(payload: &Map<String, Value>) -> Result<()> {
    match payload.get("text") {
        Some(Value::String(text)) if !text.is_empty() => Ok(()),
        _ => bail!("payload must contain a non-empty \"text\" field"),
    }
}

/// Earliest `created_at` among a set of replaced duplicates. RFC 3339 in a
/// fixed offset orders lexicographically, so the string minimum is the
/// earliest instant.
pub(crate) fn oldest_created_at(hits: &[MemoryHit]) -> Option<String> {
    hits.iter()
        .filter_map(|hit| hit.payload.get("created_at").and_then(Value::as_str))
        .min()
        .map(str::to_owned)
}

/// Whether a payload marks its entry as pinned.
pub(crate) fn is_pinned(payload: &Map<String, Value>) -> bool {
    matches!(payload.get("pinned"), Some(Value::Bool(true)))
}
