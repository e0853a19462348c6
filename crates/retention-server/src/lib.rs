pub mod error;
pub mod routes;
pub mod state;
pub mod worker;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Risk
        .route(
            "/api/orgs/{org}/risk/recalculate",
            post(routes::risk::recalculate),
        )
        .route("/api/orgs/{org}/risk/roster", get(routes::risk::roster))
        .route(
            "/api/orgs/{org}/members/{id}/risk",
            get(routes::risk::member_risk),
        )
        // Settings
        .route("/api/orgs/{org}/settings", get(routes::settings::get_settings))
        .route(
            "/api/orgs/{org}/settings/{key}",
            axum::routing::put(routes::settings::put_setting)
                .delete(routes::settings::delete_setting),
        )
        // Playbooks
        .route(
            "/api/orgs/{org}/playbooks",
            get(routes::playbooks::list_playbooks).post(routes::playbooks::create_playbook),
        )
        .route(
            "/api/orgs/{org}/playbooks/{id}",
            get(routes::playbooks::get_playbook).put(routes::playbooks::update_playbook),
        )
        .route(
            "/api/orgs/{org}/playbooks/{id}/activate",
            post(routes::playbooks::activate_playbook),
        )
        .route(
            "/api/orgs/{org}/playbooks/{id}/pause",
            post(routes::playbooks::pause_playbook),
        )
        .route(
            "/api/orgs/{org}/playbooks/{id}/archive",
            post(routes::playbooks::archive_playbook),
        )
        .route(
            "/api/orgs/{org}/playbooks/{id}/versions",
            get(routes::playbooks::list_versions),
        )
        .route(
            "/api/orgs/{org}/playbooks/{id}/trigger",
            post(routes::playbooks::trigger_playbook),
        )
        // Executions
        .route(
            "/api/orgs/{org}/executions",
            get(routes::executions::list_executions),
        )
        .route(
            "/api/orgs/{org}/executions/{id}",
            get(routes::executions::get_execution),
        )
        .route(
            "/api/orgs/{org}/messages",
            get(routes::executions::list_messages),
        )
        // Derived callers
        .route("/api/orgs/{org}/win-back", post(routes::campaigns::win_back))
        .route(
            "/api/orgs/{org}/members/{id}/freeze-intent",
            post(routes::campaigns::freeze_intent),
        )
        // Communication policy
        .route(
            "/api/orgs/{org}/policy",
            get(routes::policy::get_policy).put(routes::policy::put_policy),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Open the project at `root`, start the queue worker, and serve the API.
pub async fn serve(root: PathBuf, port: Option<u16>) -> anyhow::Result<()> {
    let app_state = tokio::task::spawn_blocking(move || AppState::open(root)).await??;
    let port = port.unwrap_or(app_state.config.server.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(app_state, listener).await
}

/// Serve on a pre-bound listener. The caller can read the actual port before
/// starting (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let worker = worker::spawn_worker(&app_state);
    let app = build_router(app_state);

    tracing::info!("retention API listening on http://localhost:{actual_port}");
    let result = axum::serve(listener, app).await;
    worker.abort();
    result?;
    Ok(())
}
