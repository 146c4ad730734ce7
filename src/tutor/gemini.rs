use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{TutorBackend, TutorError};
use crate::config::AppConfig;

pub struct GeminiBackend {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TutorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, TutorError> {
        match &config.gemini_api_key {
            Some(key) => Ok(Some(Self::new(
                key.clone(),
                config.gemini_model.clone(),
                config.gemini_endpoint.clone(),
                config.tutor_timeout(),
            )?)),
            None => Ok(None),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

fn extract_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    (!text.trim().is_empty()).then_some(text)
}

#[rocket::async_trait]
impl TutorBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, TutorError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.4, "maxOutputTokens": 1024 }
        });

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TutorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: Value = response.json().await?;
        debug!(
            prompt_tokens = json["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
            "Gemini responded"
        );

        extract_text(&json).ok_or(TutorError::EmptyResponse)
    }
}
