//! Drift analysis handlers
//!
//! Always answer 200 with a text body; failures are described in-body.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
};

use crate::error::DecodeError;
use crate::logic::pipeline::DriftPipeline;
use crate::logic::strategy::LabelRenderer;
use crate::AppState;

/// Analyze an image and generate a personalized recommendation
pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> String {
    analyze(&state, state.primary.as_ref(), &headers, body).await
}

/// Analyze an image and answer with a fixed message, no generator call
pub async fn backup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> String {
    analyze(&state, state.backup.as_ref(), &headers, body).await
}

async fn analyze(
    state: &AppState,
    renderer: &dyn LabelRenderer,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> String {
    match body {
        Ok(body) => {
            state
                .pipeline
                .respond(renderer, body, content_type(headers))
                .await
        }
        Err(rejection) => DriftPipeline::reject(
            renderer,
            body_error(&rejection, state.config.max_body_bytes),
        ),
    }
}

fn body_error(rejection: &BytesRejection, limit: usize) -> DecodeError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DecodeError::TooLarge(limit)
    } else {
        DecodeError::Body(rejection.body_text())
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
