//! Response Strategies
//!
//! How a detected drift becomes reply text. Both strategies share the same
//! detection pipeline and differ only here.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PipelineError, RecommendationError};
use crate::logic::recommender::Recommender;
use crate::models::DriftLabel;

/// Reply when the cascade finds no drift
pub const NO_DRIFT_MESSAGE: &str = "Good news, no cognitive drift recognized!";

/// Renders a detected label, and a pipeline failure, as reply text
#[async_trait]
pub trait LabelRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, label: DriftLabel) -> Result<String, RecommendationError>;

    fn render_failure(&self, err: &PipelineError) -> String;
}

// ============================================================================
// PRIMARY: generated recommendation
// ============================================================================

pub struct GenerativeRenderer {
    recommender: Arc<dyn Recommender>,
}

impl GenerativeRenderer {
    pub fn new(recommender: Arc<dyn Recommender>) -> Self {
        Self { recommender }
    }
}

#[async_trait]
impl LabelRenderer for GenerativeRenderer {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn render(&self, label: DriftLabel) -> Result<String, RecommendationError> {
        self.recommender.recommend(label).await
    }

    fn render_failure(&self, err: &PipelineError) -> String {
        format!(
            "Error in the process! Please use /backup endpoint for now. Displaying error message:\n{}",
            err
        )
    }
}

// ============================================================================
// BACKUP: static messages
// ============================================================================

pub struct StaticRenderer;

impl StaticRenderer {
    pub fn message(label: DriftLabel) -> &'static str {
        match label {
            DriftLabel::Disengagement => "Disengagement: careful, you're losing focus!",
            DriftLabel::Frustration => "Frustration: maybe it's time for a pause?",
            DriftLabel::Confusion => "Confusion: ask someone else's opinion on what you do not understand?",
            DriftLabel::Boredom => "Boredom: a short walk to get back into things!",
        }
    }
}

#[async_trait]
impl LabelRenderer for StaticRenderer {
    fn name(&self) -> &'static str {
        "backup"
    }

    async fn render(&self, label: DriftLabel) -> Result<String, RecommendationError> {
        Ok(Self::message(label).to_string())
    }

    // No further fallback exists, so the raw description is returned
    fn render_failure(&self, err: &PipelineError) -> String {
        err.to_string()
    }
}
