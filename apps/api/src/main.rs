mod chat;
mod config;
mod errors;
mod llm_client;
mod matching;
mod models;
mod profile;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chat::conversation::Conversation;
use crate::chat::prompts::greeting;
use crate::chat::session::{ConversationClient, SessionConfig};
use crate::config::Config;
use crate::llm_client::{CompletionGateway, GeminiClient};
use crate::matching::analyzer::MatchAnalyzer;
use crate::profile::load_profile;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Portfolio API v{}", env!("CARGO_PKG_VERSION"));

    // Candidate profile: read once, shared read-only
    let profile = Arc::new(load_profile(config.profile_path.as_deref())?);

    // Initialize LLM gateway
    let gateway: Arc<dyn CompletionGateway> = Arc::new(
        GeminiClient::new(config.gemini_api_key.clone(), config.gemini_base_url.clone())
            .context("Failed to build Gemini client")?,
    );
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // The one conversation client; its session is created on the first chat turn
    let session_config =
        SessionConfig::for_profile(&profile).context("Failed to build chat persona")?;
    let chat = Arc::new(ConversationClient::new(gateway.clone(), session_config));

    let state = AppState {
        conversation: Arc::new(Conversation::new(greeting(&profile))),
        chat,
        analyzer: Arc::new(MatchAnalyzer::new(gateway)),
        profile,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
