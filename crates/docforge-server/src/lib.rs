pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Projects
        .route("/api/projects", post(routes::projects::create_project))
        .route("/api/projects", get(routes::projects::list_projects))
        .route("/api/projects/{id}", get(routes::projects::get_project))
        .route(
            "/api/projects/{id}/progress",
            get(routes::projects::get_progress),
        )
        // Stage runs
        .route(
            "/api/projects/{id}/stages/{stage}/start",
            post(routes::stages::start_stage),
        )
        .route(
            "/api/projects/{id}/cancel",
            post(routes::stages::cancel_stage),
        )
        // Events (SSE)
        .route(
            "/api/projects/{id}/events",
            get(routes::events::stream_events),
        )
        // Documents
        .route(
            "/api/projects/{id}/documents/{kind}",
            get(routes::documents::get_document),
        )
        .route(
            "/api/projects/{id}/documents/{kind}/versions",
            get(routes::documents::list_versions),
        )
        .route("/api/projects/{id}/epics", get(routes::documents::list_epics))
        // Ledger
        .route(
            "/api/projects/{id}/executions",
            get(routes::executions::list_executions),
        )
        // Export
        .route("/api/projects/{id}/export", get(routes::export::export_report))
        // Health
        .route("/api/health", get(routes::health::health))
        .layer(cors)
        .with_state(state)
}

/// Start the docforge API server for an initialized root directory.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let state = AppState::from_root(&root)?;
    startup_maintenance(&state).await?;

    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("docforge API listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so
/// the caller can read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    startup_maintenance(&state).await?;

    let app = build_router(state);
    tracing::info!("docforge API listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Crash recovery and retention pruning, run once before accepting
/// requests. Executions stuck past the liveness timeout belong to a dead
/// process and are failed here so their projects can be retried.
async fn startup_maintenance(state: &AppState) -> anyhow::Result<()> {
    let recovered = state.orchestrator.recover().await?;
    if !recovered.is_empty() {
        tracing::warn!(
            count = recovered.len(),
            "recovered executions stuck from a previous process"
        );
    }
    let pruned = state.orchestrator.prune_ledger()?;
    if pruned > 0 {
        tracing::info!(count = pruned, "pruned ledger rows past retention");
    }
    Ok(())
}
