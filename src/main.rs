//! СтройМастер consultant - chat backend for the site's AI widget
//!
//! Serves chat sessions over HTTP. Each session forwards visitor questions
//! to a hosted language model, one request at a time.

mod api;
mod config;
mod conversation;
mod llm;
mod prompt;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::{AppConfig, DEFAULT_LOG_FILTER};
use prompt::Persona;
use runtime::{ServiceLlmClient, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    let service = if let Some(service) = llm::create_service(&config.llm) {
        tracing::info!(
            model = %service.model_id(),
            gateway = ?config.llm.gateway,
            "Completion service initialized"
        );
        service
    } else {
        tracing::warn!("No completion service configured. Set GEMINI_API_KEY or LLM_GATEWAY.");
        Arc::new(llm::UnconfiguredService)
    };

    let client = ServiceLlmClient::new(service, config.llm.max_output_tokens);
    let sessions = SessionManager::new(
        Arc::new(client),
        Persona::default(),
        config.session_idle_ttl,
    );
    let state = AppState::new(sessions);

    // The widget is embedded in a static site served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Consultant server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
