//! beads-server: the HTTP API over per-tenant issue stores.
//!
//! Every route lives under `/api/v1`. All routes except `health` and
//! `version` require `Authorization: Bearer <token>`; the token picks the
//! tenant store the handler works on.

pub mod auth;
pub mod error;
pub mod http;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use beads_core::tenant::TenantRegistry;

pub use error::ApiError;

/// Shared application state.
pub struct AppState {
    pub registry: Arc<dyn TenantRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self { registry }
    }
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        // Bead endpoints
        .route("/beads", post(http::create_bead).get(http::list_beads))
        .route(
            "/beads/{id}",
            get(http::get_bead)
                .patch(http::update_bead)
                .delete(http::delete_bead),
        )
        .route("/beads/{id}/claim", post(http::claim_bead))
        .route("/beads/{id}/comments", post(http::add_comment))
        .route("/beads/{id}/link", post(http::link_bead))
        .route("/beads/{id}/link/{other}", delete(http::unlink_bead))
        .route("/beads/{id}/deps", get(http::get_deps))
        // Tenant-wide endpoints
        .route("/search", get(http::search))
        .route("/clean", post(http::clean))
        .route("/projects", get(http::list_projects))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_tenant,
        ));

    let open = Router::new()
        .route("/health", get(http::health))
        .route("/version", get(http::version));

    Router::new()
        .nest("/api/v1", authenticated.merge(open))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server and run until Ctrl-C.
pub async fn serve(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "beads server listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
