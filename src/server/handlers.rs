//! HTTP route handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::error::Error;
use crate::metrics;
use crate::server::AppState;
use crate::storage::{NewQuote, QuoteId};

/// `GET /quotes` query string
#[derive(Debug, Deserialize, Default)]
pub struct QuoteFilter {
    #[serde(default)]
    pub author: Option<String>,
}

/// Response to a successful insert
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: QuoteId,
}

/// `{"error": "..."}` body with the given status
fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::EmptyStore => StatusCode::NOT_FOUND,
        Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Corruption(_) | Error::Config(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn store_error(operation: &str, err: Error) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, operation, "Store operation failed");
    } else {
        warn!(error = %err, operation, "Store operation rejected");
    }
    json_error(status, err.to_string())
}

/// Add a quote
///
/// POST /quotes
#[instrument(skip(state, payload))]
pub async fn create_quote(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<NewQuote>, JsonRejection>,
) -> Response {
    let Json(quote) = match payload {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "JSON parsing failed");
            metrics::record_operation("insert", false);
            return json_error(StatusCode::BAD_REQUEST, "bad json");
        }
    };

    let result = state.storage.insert(quote).await;
    metrics::record_operation("insert", result.is_ok());
    match result {
        Ok(id) => {
            info!(id, "Quote added");
            (StatusCode::CREATED, Json(CreatedResponse { id })).into_response()
        }
        Err(e) => store_error("insert", e),
    }
}

/// List quotes, all or by author
///
/// GET /quotes?author=...
#[instrument(skip(state))]
pub async fn list_quotes(
    Extension(state): Extension<Arc<AppState>>,
    Query(filter): Query<QuoteFilter>,
) -> Response {
    let result = state.storage.quotes(filter.author.as_deref()).await;
    metrics::record_operation("list", result.is_ok());
    match result {
        Ok(quotes) => {
            info!(count = quotes.len(), "Quotes listed");
            Json(quotes).into_response()
        }
        Err(e) => store_error("list", e),
    }
}

/// One random quote
///
/// GET /quotes/random
#[instrument(skip(state))]
pub async fn random_quote(Extension(state): Extension<Arc<AppState>>) -> Response {
    let result = state.storage.random().await;
    metrics::record_operation("random", result.is_ok());
    match result {
        Ok(quote) => {
            info!(id = quote.id, "Random quote served");
            Json(quote).into_response()
        }
        Err(e) => store_error("random", e),
    }
}

/// Delete a quote. Unknown ids are not an error.
///
/// DELETE /quotes/:id
#[instrument(skip(state))]
pub async fn delete_quote(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let id: QuoteId = match raw_id.parse() {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, raw_id = %raw_id, "Not a valid id");
            metrics::record_operation("delete", false);
            return json_error(StatusCode::BAD_REQUEST, "not valid id");
        }
    };

    let result = state.storage.delete(id).await;
    metrics::record_operation("delete", result.is_ok());
    match result {
        Ok(()) => {
            info!(id, "Quote deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => store_error("delete", e),
    }
}

/// Health check
pub async fn health_check() -> Response {
    Json(serde_json::json!({
        "status": "healthy",
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// Store internals
///
/// GET /_stats
pub async fn store_stats(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.storage.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => store_error("stats", e),
    }
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(Extension(state): Extension<Arc<AppState>>) -> Response {
    if let Ok(stats) = state.storage.stats().await {
        metrics::update_store_gauges(&stats);
    }
    metrics::export_metrics().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::Validation("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&Error::EmptyStore), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&Error::Unavailable("x".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&Error::Corruption("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
