pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod storage;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth::handlers::router())
        .merge(routes::profiles::router())
        .merge(routes::videos::router())
        .merge(routes::live::router())
        .merge(routes::invitations::router())
        .merge(routes::activity::router())
        .merge(routes::admin::router())
        .merge(routes::events::router())
        .merge(storage::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
