//! HTTP routes definition

use axum::{
    routing::{delete, get},
    Router,
};

use super::handlers;

/// Quote routes
///
/// - POST   /quotes              - Add a quote
/// - GET    /quotes[?author=A]   - List quotes, optionally by author
/// - GET    /quotes/random       - One random quote
/// - DELETE /quotes/:id          - Delete a quote
pub fn quote_routes() -> Router {
    Router::new()
        .route(
            "/quotes",
            get(handlers::list_quotes).post(handlers::create_quote),
        )
        .route("/quotes/random", get(handlers::random_quote))
        .route("/quotes/:id", delete(handlers::delete_quote))
}

/// Health, stats and metrics routes
pub fn admin_routes() -> Router {
    Router::new()
        .route("/_health", get(handlers::health_check))
        .route("/_stats", get(handlers::store_stats))
        .route("/_metrics", get(handlers::metrics_endpoint))
}
