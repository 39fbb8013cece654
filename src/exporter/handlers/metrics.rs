use crate::collectors::registry::CollectorRegistry;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use tracing::{debug, error};

/// One poll per request; the body is the snapshot of that poll.
pub async fn metrics(Extension(registry): Extension<CollectorRegistry>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    match registry.collect_all().await {
        Ok(body) => {
            debug!(bytes = body.len(), "metrics rendered");
            (StatusCode::OK, headers, body)
        }
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                headers,
                format!("Error rendering metrics: {e}"),
            )
        }
    }
}
