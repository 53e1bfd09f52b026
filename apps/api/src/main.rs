mod config;
mod errors;
mod llm_client;
mod retrieval;
mod routes;
mod state;
mod workflow;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::retrieval::{
    CvEmbeddingManager, Embedder, HashingEmbedder, HttpEmbedder, RecursiveCharacterTextSplitter,
};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobLens API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize embedder and CV index
    let embedder = build_embedder(&config);
    info!("Embedder initialized ({})", embedder.model_id());

    let splitter = RecursiveCharacterTextSplitter::new(config.chunk_size, config.chunk_overlap)?;
    let cv_index = Arc::new(CvEmbeddingManager::new(
        config.index_dir.clone(),
        embedder,
        splitter,
    ));

    if let Some(cv_path) = &config.cv_path {
        match cv_index.embed_and_store_cv(cv_path).await {
            Ok(store) => info!("Indexed {} ({} chunks)", cv_path.display(), store.len()),
            Err(e) => warn!("Could not index {}: {e}", cv_path.display()),
        }
    } else if cv_index.index_exists().await {
        info!("Using existing CV index at {}", cv_index.index_dir().display());
    } else {
        info!("No CV indexed yet; upload one to /joblens/cv");
    }

    // Initialize LLM client
    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_model.clone(),
    );
    info!("LLM client initialized (model: {})", llm.model());

    // Build app state with compiled workflows
    let state = AppState::new(Arc::new(llm), cv_index, config.retriever_k)?;

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Remote OpenAI-compatible embeddings when configured, local hashing embeddings otherwise.
fn build_embedder(config: &Config) -> Arc<dyn Embedder> {
    match &config.embedding_base_url {
        Some(base_url) => Arc::new(HttpEmbedder::new(
            base_url.clone(),
            config.embedding_model.clone(),
            config.embedding_api_key.clone(),
        )),
        None => Arc::new(HashingEmbedder::default()),
    }
}
