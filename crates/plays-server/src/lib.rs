pub mod error;
pub mod routes;
pub mod shutdown;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use plays_engine::Engine;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(engine: Arc<Engine>) -> Router {
    let app_state = state::AppState::new(engine);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Playbooks
        .route(
            "/api/playbooks",
            get(routes::playbooks::list_playbooks).post(routes::playbooks::create_playbook),
        )
        .route(
            "/api/playbooks/validate",
            post(routes::playbooks::validate_playbook),
        )
        .route(
            "/api/playbooks/{id}",
            get(routes::playbooks::get_playbook)
                .patch(routes::playbooks::update_playbook)
                .delete(routes::playbooks::delete_playbook),
        )
        // Jobs
        .route(
            "/api/jobs",
            get(routes::jobs::list_jobs).post(routes::jobs::create_job),
        )
        .route(
            "/api/jobs/{id}",
            get(routes::jobs::get_job).delete(routes::jobs::delete_job),
        )
        .route(
            "/api/jobs/{id}/status",
            patch(routes::jobs::update_job_status),
        )
        .route("/api/jobs/{id}/assign", patch(routes::jobs::assign_job))
        .route(
            "/api/jobs/{id}/start-time",
            patch(routes::jobs::reschedule_job),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Open the engine over `root` and serve the API until SIGINT/SIGTERM.
pub async fn serve(root: &Path, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    serve_on(root, listener, shutdown::install_shutdown_handler()).await
}

/// Serve on a pre-bound listener until `shutdown` is cancelled. In-flight
/// runs are cancelled along with the listener, so their jobs resolve to
/// failed before the server returns.
pub async fn serve_on(
    root: &Path,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::open(root)?);
    let app = build_router(engine.clone());

    let actual_port = listener.local_addr()?.port();
    tracing::info!(root = %root.display(), "plays API listening on http://localhost:{actual_port}");

    let engine_for_shutdown = engine.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            engine_for_shutdown.shutdown();
        })
        .await?;

    tracing::info!("plays API stopped");
    Ok(())
}
