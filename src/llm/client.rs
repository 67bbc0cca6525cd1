//! LLM client: turns a system prompt plus the user's question into a raw
//! filter document over a chat-completions API

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{QueryBuilderError, QueryBuilderResult};

/// External parser contract: natural language in, untyped filter document
/// out. The validator downstream is the source of truth for its shape.
#[async_trait]
pub trait LlmQueryParser: Send + Sync {
    async fn parse_filters(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> QueryBuilderResult<Value>;
}

/// Chat-completions client
pub struct LlmClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            client: Client::new(),
        }
    }

    async fn complete(&self, system_prompt: &str, user_input: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_input.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("request failed")?;
        anyhow::ensure!(
            response.status().is_success(),
            "model endpoint returned {}",
            response.status()
        );
        let parsed: ChatResponse = response
            .json()
            .await
            .context("response not JSON")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("model returned no choices")
    }
}

#[async_trait]
impl LlmQueryParser for LlmClient {
    async fn parse_filters(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> QueryBuilderResult<Value> {
        let raw = self
            .complete(system_prompt, user_input)
            .await
            .map_err(|e| QueryBuilderError::llm(format!("{:#}", e)))?;
        debug!(chars = raw.len(), "model response received");

        let cleaned = extract_json(&raw);
        serde_json::from_str(&cleaned).map_err(|e| {
            let preview: String = cleaned.chars().take(500).collect();
            QueryBuilderError::llm(format!(
                "model output is not valid JSON: {} (output starts with: {})",
                e, preview
            ))
        })
    }
}

/// Extract the JSON payload from a model response that may be wrapped in
/// markdown code fences or surrounded by prose
fn extract_json(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(end) = rest.find("```") {
            return rest[..end].trim().to_string();
        }
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(start) = rest.find('\n') {
            if let Some(end) = rest[start + 1..].find("```") {
                return rest[start + 1..start + 1 + end].trim().to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}
