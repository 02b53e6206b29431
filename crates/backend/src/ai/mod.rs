//! Language model access for classification and reply drafting.
//!
//! Both consumers talk to a `LanguageModel`; production wires in
//! `OpenAiClient`, tests wire in scripted doubles. A missing model is
//! represented as `None` and sends both consumers straight to their
//! fallbacks.

pub mod classifier;
pub mod responder;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use classifier::Classifier;
pub use responder::ResponseGenerator;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one chat completion and return the assistant text
    async fn complete(&self, request: ChatRequest) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.into(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.into(),
                },
            ],
            response_format: None,
        }
    }

    /// Ask the model for a single JSON object
    pub fn json(mut self) -> Self {
        self.response_format = Some(ResponseFormat::Json);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseFormat {
    #[serde(rename = "json_object")]
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": request.messages,
        });
        if let Some(format) = &request.response_format {
            body["response_format"] = serde_json::to_value(format)?;
        }

        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| anyhow!("model call timed out after {:?}", self.config.timeout))?
            .context("Failed to reach model endpoint")?
            .error_for_status()
            .context("Model endpoint returned an error status")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("Model response was not JSON")?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Model response had no message content"))?
            .to_string();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_json_format_serializes_like_openai() {
        let request = ChatRequest::new("sys", "user").json();
        let format = serde_json::to_value(request.response_format.unwrap()).unwrap();
        assert_eq!(format, serde_json::json!({"type": "json_object"}));
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].content, "user");
    }
}
