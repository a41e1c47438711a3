//! Connection settings and operation deadlines.
//!
//! Every value here maps to a global CLI flag with a `CLAWBRAIN_*` environment
//! fallback. There is no config file: the full surface is flags and env vars,
//! and connections built from a [`Config`] are owned by the invocation that
//! opened them.

use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Deadline for point operations (add, get, search, forget, check).
pub const POINT_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for sync runs, which may embed and store many chunks.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(600);

/// Connection settings for the three backing services.
#[derive(Debug, Clone)]
pub struct Config {
    /// Qdrant host.
    pub host: String,
    /// Qdrant gRPC port.
    pub port: u16,
    /// Ollama base URL.
    pub ollama_url: String,
    /// Embedding model name.
    pub model: String,
    /// Redis host.
    pub redis_host: String,
    /// Redis port.
    pub redis_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6334,
            ollama_url: "http://localhost:11434".into(),
            model: "all-minilm".into(),
            redis_host: "localhost".into(),
            redis_port: 6379,
        }
    }
}

impl Config {
    /// URL for the Qdrant gRPC endpoint.
    pub fn qdrant_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Parse a duration literal like `720h`, `1h30m`, `300ms`, or `0s`.
///
/// Accepts a sequence of `<decimal><unit>` terms with units `ns`, `us`/`µs`,
/// `ms`, `s`, `m`, `h`. A bare `0` is allowed. A bare number without a unit
/// is not.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty duration");
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    // Longest units first so "ms" is not read as "m".
    const UNITS: [(&str, f64); 7] = [
        ("ns", 1e-9),
        ("us", 1e-6),
        ("µs", 1e-6),
        ("ms", 1e-3),
        ("s", 1.0),
        ("m", 60.0),
        ("h", 3600.0),
    ];

    let mut total = 0.0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if digits == 0 {
            bail!("invalid duration {input:?}");
        }
        let value: f64 = rest[..digits]
            .parse()
            .with_context(|| format!("invalid duration {input:?}"))?;
        let unit_rest = &rest[digits..];
        let Some((suffix, multiplier)) = UNITS
            .iter()
            .find(|(suffix, _)| unit_rest.starts_with(suffix))
        else {
            bail!("invalid duration {input:?}: missing or unknown unit");
        };
        total += value * multiplier;
        rest = &unit_rest[suffix.len()..];
    }

    Ok(Duration::from_secs_f64(total))
}
