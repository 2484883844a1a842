//! Recommendation Generator Client
//!
//! HTTP client for an OpenAI-compatible chat completions endpoint that turns
//! a drift label into a short supportive message.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RecommendationError;
use crate::models::DriftLabel;

const SYSTEM_PROMPT: &str = "You are WAKEE, a kind study companion for people with ADHD. \
A camera frame of the user was just analysed and a marker of cognitive drift was detected. \
Reply with one short, warm and practical recommendation (two sentences at most) that helps \
the user get back on track. Do not mention cameras, models or analysis.";

/// Generates a recommendation for a detected drift
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, label: DriftLabel) -> Result<String, RecommendationError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Generator connection settings
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

/// Chat completions client
pub struct ChatRecommender {
    config: ChatConfig,
    http_client: reqwest::Client,
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatRecommender {
    pub fn new(config: ChatConfig) -> Result<Self, RecommendationError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, http_client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, label: DriftLabel) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(format!("Detected cognitive drift: {}.", label)),
                },
            ],
            max_tokens: 120,
            temperature: 0.7,
        }
    }
}

#[async_trait]
impl Recommender for ChatRecommender {
    async fn recommend(&self, label: DriftLabel) -> Result<String, RecommendationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(RecommendationError::NotConfigured)?;

        tracing::debug!(model = %self.config.model, %label, "Requesting recommendation");

        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&self.build_request(label))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            tracing::warn!(%label, "Recommendation generator rate limited");
            return Err(RecommendationError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecommendationError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| RecommendationError::InvalidResponse(format!("failed to parse response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RecommendationError::InvalidResponse("no content in response".to_string()))
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}
