//! One call signature over several chat-completion vendors.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{AssistError, Result};
use crate::retry::{retry_async, RetryPolicy};
use crate::USER_AGENT;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

/// Generation parameters (`max_tokens`, `temperature`, ...), translated per vendor.
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Split a leading system message from the rest of the conversation.
pub(crate) fn split_system(messages: &[Message]) -> (Option<&str>, &[Message]) {
    match messages.split_first() {
        Some((first, rest)) if first.role == Role::System => (Some(first.content.as_str()), rest),
        _ => (None, messages),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vendor {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Vendor {
    pub const ALL: [Vendor; 3] = [Vendor::OpenAi, Vendor::Anthropic, Vendor::Gemini];

    /// Environment variable holding the vendor's API key.
    pub fn key_variable(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "OPENAI_API_KEY",
            Vendor::Anthropic => "ANTHROPIC_API_KEY",
            Vendor::Gemini => "GOOGLE_API_KEY",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Vendor::OpenAi => "openai",
            Vendor::Anthropic => "anthropic",
            Vendor::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

impl FromStr for Vendor {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Vendor::OpenAi),
            "anthropic" | "claude" => Ok(Vendor::Anthropic),
            "gemini" | "google" => Ok(Vendor::Gemini),
            other => Err(AssistError::Config(format!("unknown vendor {other:?}"))),
        }
    }
}

/// A vendor able to produce a chat completion.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Text of the first completion for `messages`.
    async fn complete(&self, model: &str, params: &Params, messages: &[Message]) -> Result<String>;

    /// Model names this vendor can serve.
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Send a request and decode a JSON response, turning error statuses into [`AssistError::Status`].
pub(crate) async fn send_json(service: &str, request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AssistError::Status {
            service: service.to_string(),
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}

/// Which vendor serves which model.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<(String, Vendor)>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`; an existing registration is replaced.
    pub fn register(&mut self, vendor: Vendor, name: impl Into<String>) {
        let name = name.into();
        match self.models.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = vendor,
            None => self.models.push((name, vendor)),
        }
    }

    pub fn with_models<I, S>(mut self, vendor: Vendor, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.register(vendor, name);
        }
        self
    }

    pub fn vendor_of(&self, model: &str) -> Option<Vendor> {
        self.models.iter().find(|(n, _)| n == model).map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Routes each call to the backend serving the requested model, retrying at the network boundary.
pub struct Dispatcher {
    catalog: ModelCatalog,
    backends: HashMap<Vendor, Arc<dyn ChatBackend>>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(catalog: ModelCatalog, retry: RetryPolicy) -> Self {
        Self {
            catalog,
            backends: HashMap::new(),
            retry,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backends.insert(backend.vendor(), backend);
        self
    }

    /// Backends for every vendor with a configured API key, routed by `catalog`.
    pub fn from_settings(settings: &Settings, catalog: ModelCatalog) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let credentials = &settings.credentials;
        let endpoints = &settings.endpoints;
        let mut dispatcher = Self::new(catalog, settings.retry);

        if let Some(key) = &credentials.openai_api_key {
            dispatcher = dispatcher.with_backend(Arc::new(OpenAiBackend::new(client.clone(), key, &endpoints.openai)));
        }
        if let Some(key) = &credentials.anthropic_api_key {
            dispatcher =
                dispatcher.with_backend(Arc::new(AnthropicBackend::new(client.clone(), key, &endpoints.anthropic)));
        }
        if let Some(key) = &credentials.google_api_key {
            dispatcher = dispatcher.with_backend(Arc::new(GeminiBackend::new(client, key, &endpoints.gemini)));
        }
        Ok(dispatcher)
    }

    /// Like [`Dispatcher::from_settings`], with the catalog filled from each vendor's model listing.
    pub async fn discover(settings: &Settings) -> Result<Self> {
        let mut dispatcher = Self::from_settings(settings, ModelCatalog::new())?;
        dispatcher.refresh_catalog().await;
        Ok(dispatcher)
    }

    /// Add every model the configured backends report. A vendor whose listing fails is skipped.
    pub async fn refresh_catalog(&mut self) {
        for vendor in Vendor::ALL {
            let Some(backend) = self.backends.get(&vendor).cloned() else {
                continue;
            };
            match retry_async(&self.retry, || backend.list_models()).await {
                Ok(models) => {
                    info!("{} serves {} model(s)", vendor, models.len());
                    for model in models {
                        self.catalog.register(vendor, model);
                    }
                }
                Err(e) => warn!("Could not list {} models: {}", vendor, e),
            }
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    fn backend_for(&self, model: &str) -> Result<&Arc<dyn ChatBackend>> {
        let Some(vendor) = self.catalog.vendor_of(model) else {
            for vendor in Vendor::ALL {
                warn!(
                    "{} configured: {}",
                    vendor.key_variable(),
                    self.backends.contains_key(&vendor)
                );
            }
            return Err(AssistError::UnsupportedModel {
                model: model.to_string(),
                supported: self.catalog.names().collect::<Vec<_>>().join(", "),
            });
        };
        self.backends
            .get(&vendor)
            .ok_or_else(|| AssistError::MissingCredentials(format!("{} is not set", vendor.key_variable())))
    }

    /// Completion from `model`, retried on transient failures.
    pub async fn complete(&self, model: &str, params: &Params, messages: &[Message]) -> Result<String> {
        let backend = self.backend_for(model)?;
        retry_async(&self.retry, || backend.complete(model, params, messages)).await
    }

    /// One model after the other; pairs of model name and response.
    pub async fn complete_many(
        &self,
        models: &[String],
        params: &Params,
        messages: &[Message],
    ) -> Result<Vec<(String, String)>> {
        let mut responses = Vec::with_capacity(models.len());
        for model in models {
            let response = self.complete(model, params, messages).await?;
            responses.push((model.clone(), response));
        }
        Ok(responses)
    }

    /// All models concurrently; responses in the order of `models`.
    pub async fn gather(&self, models: &[String], params: &Params, messages: &[Message]) -> Result<Vec<String>> {
        join_all(models.iter().map(|model| self.complete(model, params, messages)))
            .await
            .into_iter()
            .collect()
    }
}
