use std::path::PathBuf;
use std::time::Duration;

use rocket::figment::Figment;
use serde::Deserialize;

use crate::error::AppError;

/// Application settings, read from the same figment Rocket uses so that
/// `Rocket.toml` and `ROCKET_*` variables apply to both.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub catalog_path: Option<PathBuf>,
    pub session_hours: i64,

    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    pub execution_timeout_ms: u64,
    pub max_output_bytes: usize,
    pub max_code_bytes: usize,

    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub tutor_timeout_secs: u64,
    pub tutor_persona: String,

    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://pykids.db?mode=rwc".to_string(),
            catalog_path: None,
            session_hours: 1,
            interpreter: "python3".to_string(),
            interpreter_args: vec!["-I".to_string(), "-".to_string()],
            execution_timeout_ms: 5_000,
            max_output_bytes: 16 * 1024,
            max_code_bytes: 8 * 1024,
            gemini_api_key: None,
            gemini_model: "gemini-pro".to_string(),
            gemini_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            tutor_timeout_secs: 30,
            tutor_persona: "YOU ARE A PROFESSIONAL EDUCATION SPECIALIST".to_string(),
            bootstrap_admin_username: None,
            bootstrap_admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, AppError> {
        let mut config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::Internal(format!("Invalid configuration: {}", e)))?;

        if config.gemini_api_key.is_none() {
            config.gemini_api_key = std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database_url = url;
            }
        }

        Ok(config)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn tutor_timeout(&self) -> Duration {
        Duration::from_secs(self.tutor_timeout_secs)
    }
}
