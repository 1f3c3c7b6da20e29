//! Structured summarization - the Pass A triage capability.
//!
//! Implementations return the model's raw text. Parsing, the single
//! deterministic repair attempt and schema normalization happen in the
//! triage stage so every backend gets the same treatment.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{EvidenceError, Result};
use crate::pipeline::prompts::{format_triage_prompt, triage_response_schema, TRIAGE_SYSTEM_PROMPT};
use crate::security::SecretString;

/// Produce a best-effort triage summary (raw JSON text) for a page.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, url: &str, text: &str) -> Result<String>;
}

#[async_trait]
impl<T: Summarizer + ?Sized> Summarizer for std::sync::Arc<T> {
    async fn summarize(&self, url: &str, text: &str) -> Result<String> {
        (**self).summarize(url, text).await
    }
}

/// OpenAI chat-completions summarizer using JSON response format.
pub struct OpenAiSummarizer {
    api_key: SecretString,
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, url: &str, text: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(serde::Deserialize)]
        struct Choice {
            message: Message,
        }

        #[derive(serde::Deserialize)]
        struct Message {
            content: Option<String>,
        }

        let system = format!(
            "{}\n\nJSON schema:\n{}",
            TRIAGE_SYSTEM_PROMPT,
            triage_response_schema()
        );
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": format_triage_prompt(url, text) },
            ],
        });

        debug!(url = %url, model = %self.model, "triage summarization request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| EvidenceError::Summarizer(Box::new(e)))?;

        if !response.status().is_success() {
            return Err(EvidenceError::Summarizer(
                format!("OpenAI API error: {}", response.status()).into(),
            ));
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| EvidenceError::Summarizer(Box::new(e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EvidenceError::Summarizer("empty completion".into()))
    }
}
