use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{AssistError, Result};
use crate::llm::{send_json, split_system, ChatBackend, Message, Params, Vendor};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Sent when the caller gives no `max_tokens`; the Messages API requires one.
pub const DEFAULT_MAX_TOKENS: u64 = 8192;

/// Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Request payload; a leading system message becomes the `system` field.
    pub fn request_body(model: &str, params: &Params, messages: &[Message]) -> Value {
        let mut body = params.clone();
        body.entry("max_tokens").or_insert_with(|| json!(DEFAULT_MAX_TOKENS));
        let (system, conversation) = split_system(messages);
        if let Some(system) = system {
            body.insert("system".to_string(), json!(system));
        }
        body.insert("model".to_string(), json!(model));
        body.insert("messages".to_string(), json!(conversation));
        Value::Object(body)
    }

    /// Text of the first text block.
    pub fn parse_response(response: &Value) -> Result<String> {
        response
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            })
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AssistError::MalformedResponse("Anthropic response has no text block".to_string()))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
    }

    async fn complete(&self, model: &str, params: &Params, messages: &[Message]) -> Result<String> {
        debug!("Anthropic message with {}", model);
        let request = self
            .authorized(self.client.post(format!("{}/v1/messages", self.base_url)))
            .json(&Self::request_body(model, params, messages));
        let response = send_json("Anthropic", request).await?;
        Self::parse_response(&response)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let request = self
            .authorized(self.client.get(format!("{}/v1/models", self.base_url)))
            .query(&[("limit", "1000")]);
        let response = send_json("Anthropic", request).await?;
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
