//! WAKEE.reloaded image analysis API
//!
//! Classifies a camera frame into affective scores, reduces them to at most
//! one cognitive drift label and answers with either a generated
//! recommendation (`/predict`) or a fixed message (`/backup`).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WAKEE API                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  request ─► Admission ─► Decoder ─► Classifier ─► Cascade   │
//! │             (per route,   (image)    (ONNX)        (rules)   │
//! │              per client)                             │       │
//! │                                          ┌───────────┴────┐  │
//! │                                          ▼                ▼  │
//! │                                    Generator (LLM)   Static  │
//! │                                     /predict         /backup │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod logic;
mod middleware;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::logic::decoder::ImageDecoder;
use crate::logic::model::{EmotionClassifier, OnnxClassifier, UnavailableClassifier};
use crate::logic::pipeline::DriftPipeline;
use crate::logic::recommender::{ChatConfig, ChatRecommender, Recommender};
use crate::logic::strategy::{GenerativeRenderer, LabelRenderer, StaticRenderer};
use crate::middleware::rate_limit::AdmissionController;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize logging
    init_tracing(&config);

    tracing::info!("WAKEE.reloaded API starting...");
    tracing::info!(
        environment = %config.environment,
        predict_limit = config.predict_rate_limit,
        backup_limit = config.backup_rate_limit,
        test_limit = config.test_rate_limit,
        window_secs = config.rate_limit_window.as_secs(),
        "Rate limits configured"
    );

    let classifier = load_classifier(&config);

    let recommender = ChatRecommender::new(ChatConfig {
        base_url: config.llm_api_url.clone(),
        api_key: config.llm_api_key.clone(),
        model: config.llm_model.clone(),
        timeout: config.llm_timeout,
    })
    .context("Failed to create recommendation client")?;

    if !recommender.is_configured() {
        tracing::warn!("LLM_API_KEY not set, /predict will point callers to /backup");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    // Build application state
    let state = AppState::new(config, classifier, Arc::new(recommender));

    // Build router
    let app = create_router(state);

    // Start server
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wakee_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Load the ONNX classifier, degrading to an unavailable one on failure
fn load_classifier(config: &Config) -> Arc<dyn EmotionClassifier> {
    let Some(path) = config.model_path.as_deref() else {
        tracing::warn!("MODEL_PATH not set, classification routes will report errors");
        return Arc::new(UnavailableClassifier::new("no model configured"));
    };

    match OnnxClassifier::load(path, config.model_sessions) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            tracing::error!("Failed to load classifier: {}", e);
            Arc::new(UnavailableClassifier::new(e.to_string()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<DriftPipeline>,
    pub primary: Arc<dyn LabelRenderer>,
    pub backup: Arc<dyn LabelRenderer>,
    pub recommender: Arc<dyn Recommender>,
    pub admission: Arc<AdmissionController>,
}

impl AppState {
    pub fn new(
        config: Config,
        classifier: Arc<dyn EmotionClassifier>,
        recommender: Arc<dyn Recommender>,
    ) -> Self {
        let pipeline = DriftPipeline::new(
            ImageDecoder::new(config.model_input_size, config.model_layout),
            classifier,
            config.thresholds,
            config.classifier_timeout,
            config.model_sessions,
        );

        let admission = AdmissionController::new(config.rate_limit_budgets())
            .with_max_tracked(config.rate_limit_max_clients);

        Self {
            pipeline: Arc::new(pipeline),
            primary: Arc::new(GenerativeRenderer::new(Arc::clone(&recommender))),
            backup: Arc::new(StaticRenderer),
            recommender,
            admission: Arc::new(admission),
            config: Arc::new(config),
        }
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no rate limit)
    let public_routes = Router::new()
        .route("/", get(handlers::root::index))
        .route("/health", get(handlers::health::check))
        .nest_service("/static", ServeDir::new(&state.config.static_dir));

    // Budgeted routes, admission runs before body extraction
    let budgeted_routes = Router::new()
        .route("/test", post(handlers::echo::mirror))
        .route("/predict", post(handlers::analysis::predict))
        .route("/backup", post(handlers::analysis::backup))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::enforce_budget,
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(budgeted_routes)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
