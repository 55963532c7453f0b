use std::sync::Arc;

use hmo_chat::chat::{session, CollectStage, QaStage, SessionManager};
use hmo_chat::config::AppConfig;
use hmo_chat::llm::{create_provider, LlmConfig};
use hmo_chat::retrieval::{create_embedder, load_knowledge_base, EmbeddingConfig, KnowledgeIndex};
use hmo_chat::server::{routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    eprintln!("🏥 HMO Chat v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Embeddings: {}", config.embedding_model);
    eprintln!("   Knowledge: {}", config.knowledge_dir.display());
    eprintln!("   API: http://0.0.0.0:{}\n", config.port);

    // Create LLM provider
    let llm_config = LlmConfig {
        backend: config.backend,
        api_key: config.api_key.clone(),
        model: config.model.clone(),
        timeout: config.upstream_timeout,
    };
    let llm = create_provider(&llm_config)?;

    // ── Knowledge index ─────────────────────────────────────────────────
    // Built eagerly so a missing or empty knowledge base fails startup
    // instead of surfacing as 503s later.
    let chunks = load_knowledge_base(&config.knowledge_dir)?;
    eprintln!("   Chunks: {}", chunks.len());

    let embedder = create_embedder(&EmbeddingConfig {
        api_key: config.embedding_api_key.clone(),
        model: config.embedding_model.clone(),
        timeout: config.upstream_timeout,
    })?;
    let index = Arc::new(KnowledgeIndex::build(embedder, chunks).await?);

    // ── Stages and sessions ─────────────────────────────────────────────
    let collect = Arc::new(CollectStage::new(Arc::clone(&llm)));
    let qa = Arc::new(QaStage::new(llm, index));
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&collect),
        Arc::clone(&qa),
        config.session_idle_timeout,
    ));

    // Spawn idle-session sweep task (runs every 60s)
    let _prune_handle = session::spawn_prune_task(Arc::clone(&sessions));

    let app = routes(AppState {
        sessions,
        collect,
        qa,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HMO chat server started");
    axum::serve(listener, app).await?;

    Ok(())
}
