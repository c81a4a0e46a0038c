//! `TrellisServer`: Axum HTTP server over the task service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use trellis_tasks::TaskService;
use trellis_tasks::connection;

use crate::auth::JwtAuth;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::health::{self, HealthResponse};
use crate::routes;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Task use cases.
    pub service: TaskService,
    /// Bearer token verification.
    pub auth: Arc<JwtAuth>,
    /// When the server started.
    pub start_time: Instant,
}

/// The Trellis HTTP server.
pub struct TrellisServer {
    config: ServerConfig,
    service: TaskService,
    auth: Arc<JwtAuth>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl TrellisServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, service: TaskService) -> Self {
        let auth = Arc::new(JwtAuth::new(&config.jwt_secret, config.jwt_leeway_secs));
        Self {
            config,
            service,
            auth,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            auth: self.auth.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .nest("/api", routes::api_routes())
            .fallback(fallback_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in a background task until shutdown is signalled.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server stopped with error");
            }
        });

        info!(%addr, "listening");
        Ok((addr, handle))
    }

    /// Signal shutdown and wait for `handle` within the configured timeout.
    pub async fn stop(&self, handle: JoinHandle<()>) {
        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        self.shutdown.graceful_shutdown(vec![handle], Some(timeout)).await;
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the token signer/verifier.
    pub fn auth(&self) -> &Arc<JwtAuth> {
        &self.auth
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let pool = state.service.pool().clone();
    let database = tokio::task::spawn_blocking(move || connection::ping(&pool).is_ok())
        .await
        .unwrap_or(false);
    Json(health::health_check(state.start_time, database))
}

async fn fallback_handler() -> ApiError {
    ApiError::RouteNotFound
}
