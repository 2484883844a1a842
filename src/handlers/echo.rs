//! Echo handler ("dumb mirror")

use axum::{
    body::Bytes,
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue},
    response::IntoResponse,
};

/// Return the request body unchanged, with the same content type
pub async fn mirror(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    tracing::debug!(bytes = body.len(), content_type = ?content_type, "Echoing request body");

    ([(CONTENT_TYPE, content_type)], body)
}
