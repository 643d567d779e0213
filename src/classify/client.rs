//! Hosted language-model classifier
//!
//! Sends each batch to a messages-style JSON API and parses the tiers out of
//! the first text block of the reply.

use crate::classify::prompt::{build_prompt, parse_assignments};
use crate::classify::{ClassificationError, TierAssignment, TierClassifier};
use crate::config::ClassifierConfig;
use crate::storage::ElementRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model used when the config does not name one
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Classifier backed by a hosted messages API
pub struct AnthropicClassifier {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClassifier {
    /// Builds a classifier from config, reading the API key from the
    /// environment variable the config names
    ///
    /// # Returns
    ///
    /// * `Ok(AnthropicClassifier)` - Ready to classify
    /// * `Err(ClassificationError::MissingApiKey)` - The variable is unset or empty
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassificationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClassificationError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(config, api_key)
    }

    /// Builds a classifier with an explicit API key
    pub fn new(config: &ClassifierConfig, api_key: String) -> Result<Self, ClassificationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TierClassifier for AnthropicClassifier {
    async fn classify(&self, batch: &[ElementRecord]) -> Result<Vec<TierAssignment>, ClassificationError> {
        let prompt = build_prompt(batch)?;
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message {
                role: "user",
                content: &prompt,
            }],
        };

        tracing::debug!("Sending {} elements to {}", batch.len(), self.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Api {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        let reply: MessagesResponse = response.json().await?;
        let text = reply
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ClassificationError::MalformedResponse("reply has no text block".to_string()))?;

        parse_assignments(&text, batch)
    }
}
