use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use clawbrain::cli;
use clawbrain::config::Config;

#[derive(Parser)]
#[command(
    name = "clawbrain",
    version,
    about = "Persistent semantic memory for AI agents"
)]
struct Cli {
    /// Qdrant host
    #[arg(long, global = true, env = "CLAWBRAIN_HOST", default_value = "localhost")]
    host: String,

    /// Qdrant gRPC port
    #[arg(long, global = true, env = "CLAWBRAIN_PORT", default_value_t = 6334)]
    port: u16,

    /// Ollama base URL
    #[arg(
        long,
        global = true,
        env = "CLAWBRAIN_OLLAMA_URL",
        default_value = "http://localhost:11434"
    )]
    ollama_url: String,

    /// Embedding model
    #[arg(long, global = true, env = "CLAWBRAIN_MODEL", default_value = "all-minilm")]
    model: String,

    /// Redis host
    #[arg(
        long,
        global = true,
        env = "CLAWBRAIN_REDIS_HOST",
        default_value = "localhost"
    )]
    redis_host: String,

    /// Redis port
    #[arg(long, global = true, env = "CLAWBRAIN_REDIS_PORT", default_value_t = 6379)]
    redis_port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a memory
    Add {
        /// Text to store (default mode)
        #[arg(long)]
        text: Option<String>,
        /// Embedding vector as a JSON array (advanced, overrides text mode)
        #[arg(long)]
        vector: Option<String>,
        /// Additional metadata as a JSON object
        #[arg(long)]
        payload: Option<String>,
        /// UUID for the point (auto-generated if omitted)
        #[arg(long)]
        id: Option<String>,
        /// Pin this memory to prevent automatic forgetting
        #[arg(long)]
        pinned: bool,
        /// Skip deduplication entirely
        #[arg(long)]
        no_merge: bool,
    },
    /// Fetch a memory by ID
    Get {
        /// UUID of the memory to fetch
        #[arg(long)]
        id: Option<String>,
    },
    /// Search memories by similarity
    Search {
        /// Text to search for (default mode)
        #[arg(long)]
        query: Option<String>,
        /// Query embedding as a JSON array (advanced, overrides text mode)
        #[arg(long)]
        vector: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = 1)]
        limit: u64,
        /// Minimum similarity score threshold
        #[arg(long, default_value_t = 0.0)]
        min_score: f32,
        /// Weight of the additive recency boost (0 disables it)
        #[arg(long, default_value_t = 0.0)]
        recency_boost: f64,
        /// Decay scale of the recency boost, in seconds
        #[arg(long, default_value_t = clawbrain::memory::types::DEFAULT_RECENCY_SCALE)]
        recency_scale: f64,
    },
    /// Remove memories not accessed within a TTL
    Forget {
        /// Duration literal, e.g. 720h or 0s
        #[arg(long, default_value = "720h")]
        ttl: String,
    },
    /// Ingest markdown files into memory
    Sync {
        /// Markdown file to ingest (repeatable)
        #[arg(long)]
        file: Vec<PathBuf>,
        /// Directory of markdown files to ingest (repeatable)
        #[arg(long)]
        dir: Vec<PathBuf>,
        /// Glob pattern to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Base path for default file discovery
        #[arg(long, env = "CLAWBRAIN_WORKSPACE", default_value = ".")]
        base: PathBuf,
    },
    /// Verify Qdrant and Ollama connectivity
    Check,
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Logs go to stderr; stdout carries exactly one JSON object per run.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config {
        host: args.host,
        port: args.port,
        ollama_url: args.ollama_url,
        model: args.model,
        redis_host: args.redis_host,
        redis_port: args.redis_port,
    };

    let result = match args.command {
        Command::Add {
            text,
            vector,
            payload,
            id,
            pinned,
            no_merge,
        } => cli::add(&config, text, vector, payload, id, pinned, no_merge).await,
        Command::Get { id } => cli::get(&config, id).await,
        Command::Search {
            query,
            vector,
            limit,
            min_score,
            recency_boost,
            recency_scale,
        } => {
            cli::search(
                &config,
                query,
                vector,
                limit,
                min_score,
                recency_boost,
                recency_scale,
            )
            .await
        }
        Command::Forget { ttl } => cli::forget(&config, ttl).await,
        Command::Sync {
            file,
            dir,
            exclude,
            base,
        } => cli::sync(&config, file, dir, exclude, base).await,
        Command::Check => cli::check(&config).await,
    };

    match result {
        Ok(value) => println!("{value}"),
        Err(err) => {
            println!(
                "{}",
                serde_json::json!({"status": "error", "message": format!("{err:#}")})
            );
            std::process::exit(1);
        }
    }
}
