pub mod auth;
pub mod children;
pub mod preferences;
pub mod videos;
pub mod youtube_oauth;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::AppState;

async fn health() -> &'static str {
    "ok"
}

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(children::routes())
        .merge(preferences::routes())
        .merge(videos::routes())
        .merge(youtube_oauth::routes())
}
