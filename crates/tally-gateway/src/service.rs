//! Vote gateway service - main entry point.
//!
//! Owns the single HTTP listener: WebSocket upgrades on `/ws`, a health
//! check on `/health`, and 403 for every other path.

use crate::auth::Authenticator;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::hub::BroadcastHub;
use crate::session::SessionRegistry;
use crate::ws::WebSocketHandler;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tally_limiter::RateLimiter;
use tally_store::VoteStoreApi;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Everything a live connection needs, shared across all of them.
pub struct GatewayState {
    pub(crate) store: Arc<dyn VoteStoreApi>,
    pub(crate) limiter: RateLimiter,
    pub(crate) auth: Arc<dyn Authenticator>,
    pub(crate) hub: BroadcastHub,
    pub(crate) sessions: SessionRegistry,
    pub(crate) version: String,
}

impl GatewayState {
    pub fn new(
        store: Arc<dyn VoteStoreApi>,
        limiter: RateLimiter,
        auth: Arc<dyn Authenticator>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            store,
            limiter,
            auth,
            hub: BroadcastHub::new(),
            sessions: SessionRegistry::new(),
            version: version.into(),
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

/// Vote gateway service state
pub struct VoteGatewayService {
    config: GatewayConfig,
    state: Arc<GatewayState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl VoteGatewayService {
    /// Create a new vote gateway service
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn VoteStoreApi>,
        limiter: RateLimiter,
        auth: Arc<dyn Authenticator>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let state = Arc::new(GatewayState::new(
            store,
            limiter,
            auth,
            crate::VERSION.to_string(),
        ));

        Ok(Self {
            config,
            state,
            shutdown_tx: None,
        })
    }

    /// Shared connection state, for embedding and tests.
    pub fn state(&self) -> Arc<GatewayState> {
        Arc::clone(&self.state)
    }

    /// Start the gateway listener
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        info!("Starting vote gateway...");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let router = self.build_router();
        let addr = self.config.addr();

        info!(addr = %addr, "Starting WebSocket server");
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        let server_handle = tokio::spawn(async move { axum::serve(listener, router).await });

        info!("Vote gateway started successfully");

        tokio::select! {
            _ = &mut shutdown_rx => {
                info!("Received shutdown signal");
            }
            result = server_handle => {
                match result {
                    Ok(Err(e)) => error!(error = %e, "Server error"),
                    Err(e) => error!(error = %e, "Server task failed"),
                    Ok(Ok(())) => {}
                }
            }
        }

        info!("Vote gateway stopped");
        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Build the router
    fn build_router(&self) -> Router {
        let state = Arc::clone(&self.state);

        Router::new()
            .route("/ws", get(ws_upgrade))
            .route("/health", get(health_check))
            .fallback(forbidden)
            .with_state(state)
    }
}

/// Upgrade a connection and hand it to its handler.
async fn ws_upgrade(
    State(state): State<Arc<GatewayState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let handler = WebSocketHandler::new(state);
        handler.handle(socket).await;
    })
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "tally-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Plain HTTP traffic has nothing to see here.
async fn forbidden() -> impl IntoResponse {
    StatusCode::FORBIDDEN
}
