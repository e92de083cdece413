use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LumiConfig;
use crate::http_client::build_http_client_with_timeout;

/// Reply when the backend answers with an error status.
pub const MODEL_UNREACHABLE_REPLY: &str = "⚠️ Lumi can't see the local model. Start LM Studio.";
/// Reply for every other failure (connection, timeout, malformed body).
pub const MODEL_ERROR_REPLY: &str = "⚠️ Local model error.";

/// Produces a reply for one user message under a system prompt.
///
/// Implementations never fail: errors are turned into displayable text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, user_text: &str, system_prompt: &str) -> String;
}

#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, thiserror::Error)]
enum GatewayError {
    #[error("LLM API returned error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LlmClient {
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_url,
            api_key,
            model,
            temperature,
            max_tokens,
            client,
        }
    }

    pub fn from_config(config: &LumiConfig) -> Result<Self> {
        let client = build_http_client_with_timeout(Some(Duration::from_secs(
            config.request_timeout_secs,
        )))?;
        Ok(Self::new(
            config.llm_api_url.clone(),
            config.llm_api_key.clone().unwrap_or_default(),
            config.llm_model.clone(),
            config.temperature,
            config.max_tokens,
            client,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn try_complete(
        &self,
        user_text: &str,
        system_prompt: &str,
    ) -> std::result::Result<String, GatewayError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_text.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut req = self.client.post(&self.api_url).json(&request);

        // Local servers do not need a key
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = req.send().await.context("Failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(GatewayError::Status { status, body });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?;

        Ok(content)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, user_text: &str, system_prompt: &str) -> String {
        match self.try_complete(user_text, system_prompt).await {
            Ok(content) => content,
            Err(e @ GatewayError::Status { .. }) => {
                tracing::warn!("Model backend unreachable: {}", e);
                MODEL_UNREACHABLE_REPLY.to_string()
            }
            Err(GatewayError::Other(e)) => {
                tracing::warn!("Model call failed: {:#}", e);
                MODEL_ERROR_REPLY.to_string()
            }
        }
    }
}
