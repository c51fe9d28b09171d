use lingochat_ai::create_backend;
use lingochat_conversation::{ConversationManager, SessionStore, TopicCatalog};
use lingochat_server::{
    config::ServerConfig, error::StartupError, routes::router, state::AppState,
    sweeper::spawn_session_sweeper,
};
use lingochat_speech::{
    GoogleTranslator, TranscriptionRecognizer, WhatlangDetector, create_synthesizer,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(report) = run().await {
        tracing::error!("{report}");
        std::process::exit(1);
    }
}

async fn run() -> lingochat_core::Result<(), StartupError> {
    // Load configuration from file and environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let catalog = match &config.catalog_path {
        Some(path) => TopicCatalog::from_file(path).map_err(|e| StartupError::Catalog {
            details: e.to_string(),
        })?,
        None => TopicCatalog::builtin(),
    };

    let backend =
        create_backend(&config.llm.backend_config()).map_err(|e| StartupError::Capability {
            name: "language model",
            details: e.to_string(),
        })?;
    let translator =
        GoogleTranslator::new(&config.translation).map_err(|e| StartupError::Capability {
            name: "translator",
            details: e.to_string(),
        })?;
    let recognizer =
        TranscriptionRecognizer::new(&config.recognition).map_err(|e| {
            StartupError::Capability {
                name: "speech recognizer",
                details: e.to_string(),
            }
        })?;
    let synthesizer = create_synthesizer(&config.speech);

    let store = Arc::new(SessionStore::with_capacity(config.session.capacity));
    let conversations = ConversationManager::new(
        Arc::new(catalog),
        store.clone(),
        backend,
        config.llm.conversation_config(),
    );

    // Spawn periodic idle session cleanup
    let sweeper = spawn_session_sweeper(store, &config.session);

    let state = Arc::new(AppState::new(
        conversations,
        Arc::new(translator),
        synthesizer,
        Arc::new(recognizer),
        Arc::new(WhatlangDetector),
    ));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr: config.bind_addr.to_string(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
