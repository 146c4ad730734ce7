//! Chat tutor: formats the learner's question into a prompt for the AI
//! backend and substitutes a canned reply whenever the backend fails.

pub mod fallback;
pub mod gemini;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};

pub use fallback::fallback_reply;
pub use gemini::GeminiBackend;

use crate::config::AppConfig;

pub const MAX_HISTORY_TURNS: usize = 50;

#[derive(Debug, Error)]
pub enum TutorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
    #[error("The AI service returned no answer")]
    EmptyResponse,
    #[error("No API key configured")]
    NotConfigured,
}

#[rocket::async_trait]
pub trait TutorBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String, TutorError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorAnswer {
    pub answer: String,
    pub source: AnswerSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub source: AnswerSource,
    pub asked_at: DateTime<Utc>,
}

pub fn build_prompt(persona: &str, message: &str) -> String {
    format!(
        "{}\n\nYou are helping a child learn Python programming. Provide simple, friendly, and clear explanations.\n\nQuestion: {}",
        persona, message
    )
}

pub struct Tutor {
    backend: Option<Box<dyn TutorBackend>>,
    persona: String,
}

impl Tutor {
    pub fn new(backend: Option<Box<dyn TutorBackend>>, persona: impl Into<String>) -> Self {
        Self {
            backend,
            persona: persona.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let backend: Option<Box<dyn TutorBackend>> = match GeminiBackend::from_config(config) {
            Ok(Some(backend)) => Some(Box::new(backend)),
            Ok(None) => {
                warn!("GEMINI_API_KEY not set, the tutor will use canned replies");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not set up the AI tutor, using canned replies");
                None
            }
        };

        Self::new(backend, config.tutor_persona.clone())
    }

    pub fn is_ai_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Always produces an answer: backend failures turn into a canned reply.
    #[instrument(skip(self, question))]
    pub async fn ask(&self, question: &str) -> TutorAnswer {
        let (backend_name, result) = match &self.backend {
            Some(backend) => (
                backend.name(),
                backend.generate(&build_prompt(&self.persona, question)).await,
            ),
            None => ("none", Err(TutorError::NotConfigured)),
        };

        match result {
            Ok(answer) => TutorAnswer {
                answer,
                source: AnswerSource::Ai,
            },
            Err(e) => {
                if !matches!(e, TutorError::NotConfigured) {
                    warn!(
                        backend = backend_name,
                        error = %e,
                        "AI tutor failed, answering from the fallback table"
                    );
                }
                TutorAnswer {
                    answer: fallback_reply(question).to_string(),
                    source: AnswerSource::Fallback,
                }
            }
        }
    }
}

/// Per-learner conversation history, bounded to the most recent turns.
#[derive(Default)]
pub struct ChatContexts {
    histories: Mutex<HashMap<i64, VecDeque<ChatTurn>>>,
}

impl ChatContexts {
    pub fn record(&self, user_id: i64, turn: ChatTurn) {
        if let Ok(mut histories) = self.histories.lock() {
            let history = histories.entry(user_id).or_default();
            history.push_back(turn);
            while history.len() > MAX_HISTORY_TURNS {
                history.pop_front();
            }
        }
    }

    pub fn history(&self, user_id: i64) -> Vec<ChatTurn> {
        self.histories
            .lock()
            .ok()
            .and_then(|histories| histories.get(&user_id).map(|h| h.iter().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn clear(&self, user_id: i64) {
        if let Ok(mut histories) = self.histories.lock() {
            histories.remove(&user_id);
        }
    }
}

#[cfg(test)]
pub mod test_backends {
    use super::{TutorBackend, TutorError};

    pub struct EchoBackend;

    #[rocket::async_trait]
    impl TutorBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str) -> Result<String, TutorError> {
            Ok(format!("echo: {}", prompt))
        }
    }

    pub struct FailingBackend;

    #[rocket::async_trait]
    impl TutorBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, TutorError> {
            Err(TutorError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }
}
