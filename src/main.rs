use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use persona_chat::api;
use persona_chat::chunking::{DEFAULT_STRIDE, DEFAULT_WINDOW};
use persona_chat::config::Config;
use persona_chat::ingest::{ingest_history, load_history};
use persona_chat::state::AppState;

#[derive(Parser)]
#[command(name = "persona-chat", version, about = "Style-mimicking chat backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Embed an exported message history into the vector index
    Ingest {
        /// JSON array of {ts, author, content}
        #[arg(long, env = "MESSAGES_JSON", default_value = "data/messages.json")]
        input: PathBuf,
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,
        #[arg(long, default_value_t = DEFAULT_STRIDE)]
        stride: usize,
    },
    /// Create the user if needed and print a fresh session token
    IssueSession {
        #[arg(long)]
        email: String,
        /// Overrides SESSION_TTL_HOURS
        #[arg(long)]
        ttl_hours: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());

    let state = AppState::new(config.clone()).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Ingest {
            input,
            window,
            stride,
        } => {
            let history = load_history(&input).await?;
            let summary = ingest_history(
                &state.http_client,
                &config.llm,
                &state.vectors,
                &history,
                window,
                stride,
            )
            .await?;
            tracing::info!(
                "Ingestion done: {} messages, {} chunks, {} vectors upserted",
                summary.messages,
                summary.chunks,
                summary.upserted
            );
            Ok(())
        }
        Command::IssueSession { email, ttl_hours } => {
            let user = state.db.find_or_create_user(&email).await?;
            let ttl = chrono::Duration::hours(ttl_hours.unwrap_or(config.session_ttl_hours));
            let session = state.db.create_session(user.id, ttl).await?;
            tracing::info!(
                "Issued session for {} valid until {}",
                user.email,
                session.expires_at
            );
            println!("{}", session.token);
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr.clone();
    tracing::info!(
        "Completion model: {} (effort {}), embeddings: {} ({} dims)",
        state.config.llm.chat_model,
        state.config.llm.reasoning_effort,
        state.config.llm.embedding_model,
        state.config.llm.embedding_dim
    );
    tracing::info!(
        "Vector index: {} namespace '{}', top_k {}",
        state.config.vector_index.host,
        state.config.vector_index.namespace,
        state.config.vector_index.top_k
    );

    let purged = state.db.purge_expired_sessions().await?;
    if purged > 0 {
        tracing::info!("Purged {purged} expired sessions");
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
