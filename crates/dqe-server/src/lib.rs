//! The HTTP surface: a thin `axum` router over `dqe-core`/`dqe-db`, wired
//! up by the `dqe` binary's `serve` subcommand and exercised directly (via
//! `tower::ServiceExt::oneshot`, no socket) by the integration tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use error::AppError;
pub use state::AppState;

/// Builds the full application router: public routes, unauthenticated, and
/// the `/api/v1` resource routes behind [`auth::require_auth`].
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics))
        .route("/api/v1/auth/login", get(auth::login))
        .route("/api/v1/auth/callback", get(auth::callback));

    let datasources = Router::new()
        .route("/", get(handlers::datasources::list).post(handlers::datasources::create))
        .route("/test", post(handlers::datasources::test))
        .route(
            "/{id}",
            get(handlers::datasources::get).put(handlers::datasources::update).delete(handlers::datasources::delete),
        )
        .route("/{id}/tables", get(handlers::datasources::tables))
        .route("/{id}/checks", get(handlers::datasources::datasource_checks));

    let checks = Router::new()
        .route("/", get(handlers::checks::list).post(handlers::checks::create))
        .route("/{id}", get(handlers::checks::get).put(handlers::checks::update).delete(handlers::checks::delete))
        .route("/{id}/run", post(handlers::checks::run))
        .route("/{id}/results", get(handlers::checks::results));

    let schedules = Router::new()
        .route("/", get(handlers::schedules::list).post(handlers::schedules::create))
        .route(
            "/{id}",
            get(handlers::schedules::get).put(handlers::schedules::update).delete(handlers::schedules::delete),
        )
        .route("/{id}/run", post(handlers::schedules::run))
        .route("/{id}/executions", get(handlers::schedules::executions));

    let alert_channels = Router::new()
        .route("/", get(handlers::alerts::list).post(handlers::alerts::create))
        .route("/{id}", get(handlers::alerts::get).put(handlers::alerts::update).delete(handlers::alerts::delete))
        .route("/{id}/test", post(handlers::alerts::test));

    let views = Router::new()
        .route("/", get(handlers::views::list).post(handlers::views::create))
        .route("/{id}", get(handlers::views::get).put(handlers::views::update).delete(handlers::views::delete))
        .route("/{id}/query", get(handlers::views::query))
        .route("/{id}/validate", post(handlers::views::validate))
        .route("/{id}/sql", get(handlers::views::sql));

    let protected = Router::new()
        .nest("/api/v1/datasources", datasources)
        .nest("/api/v1/checks", checks)
        .nest("/api/v1/schedules", schedules)
        .nest("/api/v1/alerts/channels", alert_channels)
        .route("/api/v1/alerts/history", get(handlers::alerts::history))
        .nest("/api/v1/views", views)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    public.merge(protected).layer(CorsLayer::permissive()).with_state(state)
}
