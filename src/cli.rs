//! Subcommand implementations.
//!
//! Each function opens its own connections, drives the engine, and returns
//! the JSON object the binary prints to stdout. Errors bubble up to `main`,
//! which renders them as `{"status":"error","message":…}` with exit code 1.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

use crate::config::{self, Config};
use crate::embedding::OllamaClient;
use crate::index::Index;
use crate::ingest::{self, SyncOptions};
use crate::memory::{types, AddInput, AddOptions, Engine, SearchOptions};
use crate::redis;

/// `clawbrain add`
pub async fn add(
    config: &Config,
    text: Option<String>,
    vector_json: Option<String>,
    payload_json: Option<String>,
    id: Option<String>,
    pinned: bool,
    no_merge: bool,
) -> Result<Value> {
    let payload = parse_payload(payload_json.as_deref())?;

    // Vector mode overrides text mode when both are given.
    let input = if let Some(raw) = vector_json {
        AddInput::Vector(parse_vector(&raw)?)
    } else if let Some(text) = text {
        AddInput::Text(text)
    } else {
        bail!("--text is required (or --vector for advanced mode)");
    };

    let engine = connect_engine(config, config::POINT_OP_TIMEOUT)?;
    let outcome = engine
        .add(
            input,
            AddOptions {
                id,
                payload,
                pinned,
                no_merge,
            },
        )
        .await?;
    Ok(with_status_ok(serde_json::to_value(&outcome)?))
}

/// `clawbrain get`
pub async fn get(config: &Config, id: Option<String>) -> Result<Value> {
    let Some(id) = id.filter(|id| !id.is_empty()) else {
        bail!("--id is required");
    };
    let engine = connect_engine(config, config::POINT_OP_TIMEOUT)?;
    match engine.get(&id).await? {
        Some(hit) => Ok(json!({"status": "ok", "id": hit.id, "payload": hit.payload})),
        None => bail!("memory {id} not found"),
    }
}

/// `clawbrain search`
#[allow(clippy::too_many_arguments)]
pub async fn search(
    config: &Config,
    query: Option<String>,
    vector_json: Option<String>,
    limit: u64,
    min_score: f32,
    recency_boost: f64,
    recency_scale: f64,
) -> Result<Value> {
    let engine = connect_engine(config, config::POINT_OP_TIMEOUT)?;

    let vector = if let Some(raw) = vector_json {
        parse_vector(&raw)?
    } else if let Some(query) = query {
        engine.embed(&query).await?
    } else {
        bail!("--query is required (or --vector for advanced mode)");
    };

    let opts = SearchOptions {
        min_score,
        limit,
        recency_weight: recency_boost,
        recency_scale,
    };
    let results = engine.search(vector, &opts).await?;
    let confidence = types::confidence(&results);
    let returned = results.len();
    Ok(json!({
        "status": "ok",
        "results": results,
        "returned": returned,
        "confidence": confidence,
    }))
}

/// `clawbrain forget`
pub async fn forget(config: &Config, ttl: String) -> Result<Value> {
    let duration = config::parse_duration(&ttl).context("invalid TTL")?;
    let engine = connect_engine(config, config::POINT_OP_TIMEOUT)?;
    let deleted = engine.forget(duration).await?;
    Ok(json!({"status": "ok", "deleted": deleted, "ttl": ttl}))
}

/// `clawbrain sync`
pub async fn sync(
    config: &Config,
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    excludes: Vec<String>,
    base: PathBuf,
) -> Result<Value> {
    let engine = connect_engine(config, config::SYNC_TIMEOUT)?;
    let mut state = redis::Client::connect(&config.redis_host, config.redis_port)
        .await
        .context("redis")?;

    let report = ingest::run(
        &engine,
        &mut state,
        &SyncOptions {
            base,
            files,
            dirs,
            excludes,
        },
    )
    .await?;
    Ok(with_status_ok(serde_json::to_value(&report)?))
}

/// `clawbrain check`
pub async fn check(config: &Config) -> Result<Value> {
    let engine = connect_engine(config, config::POINT_OP_TIMEOUT)?;
    engine.check().await?;
    Ok(json!({"status": "ok", "message": "Qdrant and Ollama verified"}))
}

/// Open the index and embedder sessions this invocation will own.
fn connect_engine(config: &Config, timeout: Duration) -> Result<Engine> {
    let index = Index::connect(&config.qdrant_url(), timeout)?;
    let embedder = OllamaClient::new(&config.ollama_url, timeout)?;
    Ok(Engine::new(index, embedder, config.model.clone()))
}

fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    serde_json::from_str(raw).context("invalid vector JSON")
}

fn parse_payload(raw: Option<&str>) -> Result<Map<String, Value>> {
    match raw {
        None => Ok(Map::new()),
        Some("") => Ok(Map::new()),
        Some(raw) => serde_json::from_str(raw).context("invalid payload JSON"),
    }
}

/// Stamp `"status": "ok"` onto an object-shaped response.
fn with_status_ok(mut value: Value) -> Value {
    if let Value::Object(ref mut object) = value {
        object.insert("status".to_string(), Value::String("ok".to_string()));
    }
    value
}
