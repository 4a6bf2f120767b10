use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use rewrite::aggregate::{GenerationEnvelope, to_envelope};
use rewrite::config::{EditorConfig, Overrides, load_dotenv};
use rewrite::consts::{API_KEY_ENV, API_KEY_FILE, AUTHOR, DEFAULT_PORT, default_db_path};
use rewrite::engine::Engine;
use rewrite::engine::batch::BatchEngine;
use rewrite::provider::openai::OpenAiProvider;
use rewrite::server::{AppState, router};
use rewrite::store::sqlite::SqliteStore;

#[derive(Parser)]
#[command(name = "rewrite", version, author = AUTHOR, about = "Essay feedback from a panel of LLM editors.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Chat model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Whole-batch timeout in seconds
    #[arg(long, global = true)]
    batch_timeout: Option<u64>,

    /// Extra attempts per editor request after a failure
    #[arg(long, global = true)]
    retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Port to listen on (falls back to $PORT, then 3001)
        #[arg(long)]
        port: Option<u16>,

        /// SQLite database path (use :memory: for ephemeral)
        #[arg(long)]
        db: Option<String>,
    },
    /// Run every editor over an essay and print the results as JSON
    Evaluate {
        /// Essay file
        #[arg(long)]
        essay: PathBuf,

        /// Source text file, needed for fact checking
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Write an essay from a source text and an assignment prompt
    Generate {
        /// Source text file
        #[arg(long)]
        source: PathBuf,

        /// Assignment prompt
        #[arg(long)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = load_dotenv(&std::env::current_dir()?);
    rewrite::logging::init();
    for path in &loaded {
        info!(path = %path.display(), "loaded environment file");
    }
    let cli = Cli::parse();

    let config = EditorConfig::from_env().with_overrides(Overrides {
        model: cli.model,
        request_timeout_secs: cli.timeout,
        batch_timeout_secs: cli.batch_timeout,
        max_retries: cli.retries,
    });

    match cli.command {
        Command::Serve { host, port, db } => serve(&config, &host, port, db).await,
        Command::Evaluate { essay, source } => {
            let essay = read_file(&essay)?;
            let source = match source {
                Some(path) => read_file(&path)?,
                None => String::new(),
            };
            let engine = build_engine(&config)?;
            let batch = engine.run_batch(&essay, &source).await?;
            println!("{}", serde_json::to_string_pretty(&to_envelope(&batch))?);
            Ok(())
        }
        Command::Generate { source, prompt } => {
            let source = read_file(&source)?;
            let engine = build_engine(&config)?;
            let response = engine.generate(&source, &prompt).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&GenerationEnvelope { response })?
            );
            Ok(())
        }
    }
}

async fn serve(config: &EditorConfig, host: &str, port: Option<u16>, db: Option<String>) -> Result<()> {
    let port = match port {
        Some(port) => port,
        None => match std::env::var("PORT") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("invalid PORT value '{value}'"))?,
            Err(_) => DEFAULT_PORT,
        },
    };

    let db = match db {
        Some(db) => db,
        None => {
            let path = default_db_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            path.to_string_lossy().into_owned()
        }
    };

    let engine: Arc<dyn Engine> = Arc::new(build_engine(config)?);
    let store = Arc::new(SqliteStore::open(&db)?);
    let app = router(AppState::new(engine, store));

    let addr: SocketAddr = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("failed to resolve {host}:{port}"))?
        .next()
        .with_context(|| format!("no address for {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, model = %config.model, db = %db, "rewrite listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_engine(config: &EditorConfig) -> Result<BatchEngine> {
    let api_key = match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => bail!("{API_KEY_ENV} is not set (checked {API_KEY_FILE}, .env and the environment)"),
    };
    let provider = OpenAiProvider::new(config, api_key)?;
    Ok(BatchEngine::new(Arc::new(provider), config))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
