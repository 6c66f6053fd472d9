//! DeepSeek chat-completions client.
//!
//! All model calls in the pipeline go through this one client, serially:
//! completions are rate- and cost-sensitive, and later calls depend on
//! earlier results.

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LlmConfig;

pub struct ChatClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl ChatClient {
    pub fn new(api_key: SecretString, config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
        }
    }

    /// Send a system+user prompt pair and return the assistant text.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        self.complete_inner(system_prompt, user_prompt, temperature, false)
            .await
    }

    /// Same as `complete`, but asks the API to emit a JSON object.
    /// The output still goes through the tolerant parser downstream.
    pub async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        self.complete_inner(system_prompt, user_prompt, temperature, true)
            .await
    }

    async fn complete_inner(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        json_mode: bool,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("Chat API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Chat API error ({}): {}", status, error_body);
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat API response")?;

        if let Some(usage) = &api_response.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                model = %self.model,
                "Chat completion finished"
            );
        }

        let content = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            bail!("Chat API returned an empty completion");
        }

        Ok(content)
    }
}

// --- Request/Response Types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}
