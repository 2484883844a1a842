//! Error handling

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::middleware::rate_limit::RouteId;

pub type AppResult<T> = Result<T, AppError>;

// ============================================================================
// PIPELINE ERRORS
// ============================================================================

/// Image bytes could not be turned into a model input
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty image payload")]
    Empty,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("corrupt image data: {0}")]
    Corrupt(String),

    #[error("image decoding worker failed: {0}")]
    Worker(String),

    #[error("image payload exceeds {0} bytes")]
    TooLarge(usize),

    #[error("failed to read request body: {0}")]
    Body(String),
}

/// Emotion classifier failed or returned unusable scores
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed classifier output: {0}")]
    MalformedOutput(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Recommendation generator failed
#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("recommendation generator is not configured")]
    NotConfigured,

    #[error("recommendation generator rate limited")]
    RateLimited,

    #[error("recommendation request failed: {0}")]
    RequestFailed(String),

    #[error("invalid recommendation response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RecommendationError {
    fn from(err: reqwest::Error) -> Self {
        RecommendationError::RequestFailed(err.to_string())
    }
}

/// Any failure between receiving the image and rendering the reply
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Recommendation(#[from] RecommendationError),
}

impl PipelineError {
    /// Short name of the failing stage, for logs
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode",
            PipelineError::Classification(_) => "classification",
            PipelineError::Recommendation(_) => "recommendation",
        }
    }
}

/// Admission control rejection
#[derive(Debug, Clone, Error)]
#[error("Rate limit exceeded: {limit} per {} second(s)", window.as_secs())]
pub struct RateLimitExceeded {
    pub route: RouteId,
    pub limit: u32,
    pub window: Duration,
    pub retry_after: Duration,
}

// ============================================================================
// HTTP ERRORS
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    RateLimited(RateLimitExceeded),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::RateLimited(rejection) => {
                (StatusCode::TOO_MANY_REQUESTS, rejection.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        let mut response = (status, body).into_response();

        if let AppError::RateLimited(rejection) = &self {
            // Round up so clients never retry inside the window
            let secs = rejection.retry_after.as_secs()
                + u64::from(rejection.retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

impl From<RateLimitExceeded> for AppError {
    fn from(err: RateLimitExceeded) -> Self {
        AppError::RateLimited(err)
    }
}
