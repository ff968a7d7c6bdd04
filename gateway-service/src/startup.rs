//! Application startup and lifecycle management.

use crate::config::GatewayConfig;
use crate::handlers::{chat, health};
use crate::services::{
    CompletionProvider, CredentialPool, HttpTenantStore, LeadNotifier, OpenAiChatProvider,
    TenantStore,
};
use axum::routing::{get, post};
use axum::Router;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<dyn TenantStore>,
    pub provider: Arc<dyn CompletionProvider>,
    pub credentials: CredentialPool,
    pub notifier: LeadNotifier,
}

/// Build the router: the chat endpoint plus the liveness probe.
///
/// The permissive CORS layer answers OPTIONS preflights; other non-POST
/// methods on /chat get a 405 from the method fallback.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/chat",
            post(chat::chat).fallback(chat::method_not_allowed),
        )
        .route("/health", get(health::health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with production collaborators.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let store: Arc<dyn TenantStore> = Arc::new(HttpTenantStore::new(&config.repository));
        let provider: Arc<dyn CompletionProvider> =
            Arc::new(OpenAiChatProvider::new(&config.completion));
        let credentials = CredentialPool::new(config.completion.api_keys.clone());
        let notifier = LeadNotifier::from_config(&config.notifier);

        tracing::info!(
            default_model = %config.models.default_model,
            premium_model = %config.models.premium_model,
            credentials = credentials.len(),
            context_window = config.models.context_window,
            "initialized gateway collaborators"
        );

        let state = AppState {
            config: Arc::new(config),
            store,
            provider,
            credentials,
            notifier,
        };

        Self::build_with_state(state).await
    }

    /// Build the application around pre-wired state (used by tests to
    /// inject mock collaborators).
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        // Port 0 binds a random free port for testing.
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("gateway listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    ///
    /// In-flight detached persistence tasks continue on the runtime while
    /// the server drains.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
