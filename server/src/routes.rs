// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::HeaderName,
    routing::{delete, get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};

/// Creates and configures the application router.
pub fn create_router(pool: SqlitePool) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/auth/login", post(handlers::login))
        .route("/attendance/today", get(handlers::today_attendance))
        .route("/attendance/clock-in", post(handlers::clock_in))
        .route("/attendance/clock-out", post(handlers::clock_out))
        .route(
            "/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        .route("/reports/{id}", delete(handlers::delete_report))
        .route("/clients", get(handlers::list_clients))
        .route("/projects", get(handlers::list_projects))
        // Adds the database pool and clock locks to the application state
        .with_state(AppState::new(pool))
}

/// Mounts `router` under `prefix` when one is configured.
pub fn with_prefix(router: Router, prefix: Option<&str>) -> Router {
    match prefix {
        Some(prefix) => Router::new().nest(prefix, router),
        None => router,
    }
}

/// Any origin and method; only the headers the frontend sends.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("authorization"),
        ])
        .allow_origin(Any)
}
