use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{AssistError, Result};
use crate::llm::{send_json, ChatBackend, Message, Params, Vendor};

/// OpenAI-compatible chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Request payload; `max_tokens` is sent as `max_completion_tokens`.
    pub fn request_body(model: &str, params: &Params, messages: &[Message]) -> Value {
        let mut body = params.clone();
        if let Some(max_tokens) = body.remove("max_tokens") {
            body.insert("max_completion_tokens".to_string(), max_tokens);
        }
        body.insert("model".to_string(), json!(model));
        body.insert("messages".to_string(), json!(messages));
        Value::Object(body)
    }

    pub fn parse_response(response: &Value) -> Result<String> {
        response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AssistError::MalformedResponse("OpenAI response has no message content".to_string()))
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn vendor(&self) -> Vendor {
        Vendor::OpenAi
    }

    async fn complete(&self, model: &str, params: &Params, messages: &[Message]) -> Result<String> {
        debug!("OpenAI chat completion with {}", model);
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(model, params, messages));
        let response = send_json("OpenAI", request).await?;
        Self::parse_response(&response)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let request = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key);
        let response = send_json("OpenAI", request).await?;
        Ok(response
            .get("data")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}
