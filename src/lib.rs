//! Persistent semantic memory for AI agents.
//!
//! ClawBrain is a thin, opinionated layer over a vector index. It stores short
//! text fragments together with their embeddings and a structured metadata
//! record, and recalls them by cosine similarity. What makes the stored rows
//! behave like *memory* is the lifecycle layer: automatic timestamping,
//! access-driven liveness, TTL-based decay with pinning immunity,
//! near-duplicate merging that preserves lineage, and an idempotent
//! file-ingestion pipeline.
//!
//! # Architecture
//!
//! - **Storage**: [Qdrant](https://qdrant.tech/) — a single cosine collection
//!   named `memories`, vector width fixed by the first insert
//! - **Embeddings**: [Ollama](https://ollama.com/) via `POST /api/embed`
//! - **Sync state**: Redis keys of shape `sync:<absolute-path>`, spoken over
//!   a minimal RESP client
//! - **Transport**: a CLI that prints exactly one JSON object per invocation
//!
//! # Modules
//!
//! - [`config`] — connection settings, timeouts, and duration parsing
//! - [`index`] — typed operations over the Qdrant collection
//! - [`embedding`] — text-to-vector via the Ollama embed endpoint
//! - [`redis`] — minimal RESP client for sync-state tracking
//! - [`memory`] — the engine: add, get, search, forget, dedup-merge, pinning
//! - [`ingest`] — file discovery, chunking, normalization, idempotent sync
//! - [`cli`] — one function per subcommand, shaping results to JSON

pub mod cli;
pub mod config;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod redis;
