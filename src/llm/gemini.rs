use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::Result;
use crate::llm::{send_json, split_system, ChatBackend, Message, Params, Role, Vendor};

pub const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const GENERATE_METHOD: &str = "generateContent";

/// Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

fn bare_model_name(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Translate generic parameter names into `generationConfig` fields.
    pub fn generation_config(params: &Params) -> Params {
        let mut config = Params::new();
        for (key, value) in params {
            match key.as_str() {
                "max_tokens" => {
                    config.insert("maxOutputTokens".to_string(), value.clone());
                }
                "top_p" => {
                    config.insert("topP".to_string(), value.clone());
                }
                "top_k" => {
                    config.insert("topK".to_string(), value.clone());
                }
                "stop" => {
                    let sequences = match value {
                        Value::String(s) => json!([s]),
                        other => other.clone(),
                    };
                    config.insert("stopSequences".to_string(), sequences);
                }
                _ => {
                    config.insert(key.clone(), value.clone());
                }
            }
        }
        config
    }

    /// Request payload. The leading system message becomes `systemInstruction`,
    /// other system messages are dropped, and the assistant speaks as `model`.
    pub fn request_body(params: &Params, messages: &[Message]) -> Value {
        let (system, _) = split_system(messages);
        let contents: Vec<Value> = messages
            .iter()
            .filter_map(|message| {
                let role = match message.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    Role::System => return None,
                };
                Some(json!({
                    "role": role,
                    "parts": [{ "text": format!("{}\n", message.content) }],
                }))
            })
            .collect();
        let safety_settings: Vec<Value> = HARM_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": Self::generation_config(params),
            "safetySettings": safety_settings,
        });
        if let Some(system) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    /// Concatenated text parts of the first candidate; empty when the prompt was blocked.
    pub fn parse_response(response: &Value) -> String {
        let Some(parts) = response
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
        else {
            warn!(
                "Gemini returned no candidate: {}",
                response.get("promptFeedback").unwrap_or(&Value::Null)
            );
            return String::new();
        };
        parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect()
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn vendor(&self) -> Vendor {
        Vendor::Gemini
    }

    async fn complete(&self, model: &str, params: &Params, messages: &[Message]) -> Result<String> {
        debug!("Gemini content generation with {}", model);
        let request = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:{}",
                self.base_url,
                bare_model_name(model),
                GENERATE_METHOD
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(params, messages));
        let response = send_json("Gemini", request).await?;
        Ok(Self::parse_response(&response))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(format!("{}/v1beta/models", self.base_url))
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = send_json("Gemini", request).await?;

            for model in response.get("models").and_then(Value::as_array).into_iter().flatten() {
                let supports_generation = model
                    .get("supportedGenerationMethods")
                    .and_then(Value::as_array)
                    .is_some_and(|methods| methods.iter().any(|m| m.as_str() == Some(GENERATE_METHOD)));
                if !supports_generation {
                    continue;
                }
                if let Some(name) = model.get("name").and_then(Value::as_str) {
                    names.push(bare_model_name(name).to_string());
                }
            }

            page_token = response
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        Ok(names)
    }
}
