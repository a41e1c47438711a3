#![allow(dead_code)]

pub mod mock_redis;

use std::sync::{Mutex, MutexGuard};

use clawbrain::config::{Config, POINT_OP_TIMEOUT};

static LIVE_GATE: Mutex<()> = Mutex::new(());

/// Live tests share the backing services, including destructive steps like
/// zero-TTL forgets and collection wipes. Each live test holds this guard
/// for its whole body so those steps never interleave.
pub fn live_gate() -> MutexGuard<'static, ()> {
    LIVE_GATE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
use clawbrain::embedding::OllamaClient;
use clawbrain::index::Index;
use clawbrain::memory::Engine;

/// Open a live engine for end-to-end tests, or `None` with a note on stderr
/// when the suite is not opted in or Qdrant is unreachable.
///
/// Live tests are destructive (forget with a zero TTL empties the unpinned
/// collection), so they require both an explicit `CLAWBRAIN_TEST_LIVE=1`
/// opt-in and a reachable scratch Qdrant at the default address.
pub async fn live_engine() -> Option<Engine> {
    if std::env::var("CLAWBRAIN_TEST_LIVE").is_err() {
        eprintln!("skipping live test: set CLAWBRAIN_TEST_LIVE=1 to run against local services");
        return None;
    }
    let config = Config::default();
    let index = Index::connect(&config.qdrant_url(), POINT_OP_TIMEOUT).ok()?;
    if index.exists().await.is_err() {
        eprintln!(
            "skipping live test: qdrant not reachable at {}",
            config.qdrant_url()
        );
        return None;
    }
    let embedder = OllamaClient::new(&config.ollama_url, POINT_OP_TIMEOUT).ok()?;
    Some(Engine::new(index, embedder, config.model))
}

/// A second index handle on the same collection, for cleanup between runs.
pub fn scratch_index() -> Option<Index> {
    let config = Config::default();
    Index::connect(&config.qdrant_url(), POINT_OP_TIMEOUT).ok()
}

/// Deterministic unit vector with a spike at `seed`. Distinct seeds give
/// orthogonal vectors.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; 8];
    vector[seed % 8] = 1.0;
    vector
}

/// A small perturbation of `base`, L2-normalized. Cosine similarity to the
/// base stays far above the dedup threshold.
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut vector = base.to_vec();
    vector[(base.len() / 2) % base.len()] += 0.05;
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}
