use axum::{Router, routing::get};

use super::api_routes;
use crate::{
    AppState, handlers,
    models::{News, Price, Program},
};

/// Public Router Module
///
/// Unauthenticated endpoints: the health probe and the read/write JSON API consumed by the
/// clinic site.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // /api/v1/programs, /api/v1/programs/{id}
        .nest("/api/v1/programs", api_routes::<Program>())
        // /api/v1/prices, /api/v1/prices/{id}
        .nest("/api/v1/prices", api_routes::<Price>())
        // /api/v1/news, /api/v1/news/{id}; always paginated
        .nest("/api/v1/news", api_routes::<News>())
}
