//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::logic::decoder::TensorLayout;
use crate::logic::drift::{
    DriftThresholds, BOREDOM_MAX, CONFUSION_MAX, ENGAGEMENT_MIN, FRUSTRATION_MAX,
};
use crate::middleware::rate_limit::{RateLimitBudget, RouteId};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Force JSON log output
    pub json_logs: bool,

    /// Directory holding `index.html`
    pub templates_dir: PathBuf,

    /// Directory served under `/static`
    pub static_dir: PathBuf,

    /// Maximum accepted request body
    pub max_body_bytes: usize,

    /// Use `X-Forwarded-For` as client identity
    pub trust_forwarded_for: bool,

    /// Shared window for every route budget
    pub rate_limit_window: Duration,
    pub test_rate_limit: u32,
    pub predict_rate_limit: u32,
    pub backup_rate_limit: u32,

    /// Tracked (route, client) entries before expired ones are swept
    pub rate_limit_max_clients: usize,

    /// ONNX model file, classifier is unavailable when unset
    pub model_path: Option<PathBuf>,
    pub model_input_size: u32,
    pub model_layout: TensorLayout,
    pub model_sessions: usize,
    pub classifier_timeout: Duration,

    pub thresholds: DriftThresholds,

    /// OpenAI-compatible chat completions base URL
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());

        let json_logs = env::var("LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(environment == "production");

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: parse_var("PORT", 7860),

            environment,

            json_logs,

            templates_dir: env::var("TEMPLATES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("templates")),

            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),

            max_body_bytes: parse_var("MAX_BODY_BYTES", 10 * 1024 * 1024),

            trust_forwarded_for: parse_var("TRUST_FORWARDED_FOR", false),

            rate_limit_window: Duration::from_secs(parse_var("RATE_LIMIT_WINDOW_SECS", 60)),
            test_rate_limit: parse_var("TEST_RATE_LIMIT", 5),
            predict_rate_limit: parse_var("PREDICT_RATE_LIMIT", 2),
            backup_rate_limit: parse_var("BACKUP_RATE_LIMIT", 2),
            rate_limit_max_clients: parse_var("RATE_LIMIT_MAX_CLIENTS", 10_000),

            model_path: env::var("MODEL_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            model_input_size: parse_var("MODEL_INPUT_SIZE", 224),
            model_layout: parse_var("MODEL_LAYOUT", TensorLayout::Nchw),
            model_sessions: parse_var::<usize>("MODEL_SESSIONS", 2).max(1),
            classifier_timeout: Duration::from_secs(parse_var("CLASSIFIER_TIMEOUT_SECS", 20)),

            thresholds: DriftThresholds {
                engagement_min: parse_var("DRIFT_ENGAGEMENT_MIN", ENGAGEMENT_MIN),
                frustration_max: parse_var("DRIFT_FRUSTRATION_MAX", FRUSTRATION_MAX),
                confusion_max: parse_var("DRIFT_CONFUSION_MAX", CONFUSION_MAX),
                boredom_max: parse_var("DRIFT_BOREDOM_MAX", BOREDOM_MAX),
            },

            llm_api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.mistral.ai/v1".to_string()),
            llm_api_key: env::var("LLM_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "mistral-small-latest".to_string()),
            llm_timeout: Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", 30)),
        }
    }

    /// Per-route request budgets
    pub fn rate_limit_budgets(&self) -> Vec<RateLimitBudget> {
        vec![
            RateLimitBudget::new(RouteId::Test, self.test_rate_limit, self.rate_limit_window),
            RateLimitBudget::new(RouteId::Predict, self.predict_rate_limit, self.rate_limit_window),
            RateLimitBudget::new(RouteId::Backup, self.backup_rate_limit, self.rate_limit_window),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            environment: "development".to_string(),
            json_logs: false,
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            max_body_bytes: 10 * 1024 * 1024,
            trust_forwarded_for: false,
            rate_limit_window: Duration::from_secs(60),
            test_rate_limit: 5,
            predict_rate_limit: 2,
            backup_rate_limit: 2,
            rate_limit_max_clients: 10_000,
            model_path: None,
            model_input_size: 224,
            model_layout: TensorLayout::Nchw,
            model_sessions: 2,
            classifier_timeout: Duration::from_secs(20),
            thresholds: DriftThresholds::default(),
            llm_api_url: "https://api.mistral.ai/v1".to_string(),
            llm_api_key: None,
            llm_model: "mistral-small-latest".to_string(),
            llm_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let config = Config::default();
        let budgets = config.rate_limit_budgets();

        let test = budgets.iter().find(|b| b.route == RouteId::Test).unwrap();
        let predict = budgets.iter().find(|b| b.route == RouteId::Predict).unwrap();
        let backup = budgets.iter().find(|b| b.route == RouteId::Backup).unwrap();

        assert_eq!(test.max_requests, 5);
        assert_eq!(predict.max_requests, 2);
        assert_eq!(backup.max_requests, 2);
        // Diagnostic route is the most generous
        assert!(test.max_requests > predict.max_requests);
        assert_eq!(predict.window, Duration::from_secs(60));
    }

    #[test]
    fn test_default_thresholds() {
        let config = Config::default();
        assert_eq!(config.thresholds.engagement_min, 2.5);
        assert_eq!(config.thresholds.frustration_max, 0.5);
        assert_eq!(config.thresholds.confusion_max, 0.61);
        assert_eq!(config.thresholds.boredom_max, 1.05);
    }

    #[test]
    fn test_parse_var_falls_back() {
        assert_eq!(parse_var("WAKEE_TEST_UNSET_VARIABLE", 42u32), 42);
    }
}
