use std::env;
use std::time::Duration;

use crate::error::{AssistError, Result};
use crate::retry::RetryPolicy;

pub const DEFAULT_ARXIV_BASE_URL: &str = "https://arxiv.org";
pub const DEFAULT_ARXIV_EXPORT_URL: &str = "https://export.arxiv.org";
pub const DEFAULT_GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// API keys for the services the toolkit talks to.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub google_search_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
}

/// Base URLs of every HTTP endpoint, overridable so tests can point them at a mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub arxiv: String,
    pub arxiv_export: String,
    pub google_search: String,
    pub openai: String,
    pub anthropic: String,
    pub gemini: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            arxiv: DEFAULT_ARXIV_BASE_URL.to_string(),
            arxiv_export: DEFAULT_ARXIV_EXPORT_URL.to_string(),
            google_search: DEFAULT_GOOGLE_SEARCH_URL.to_string(),
            openai: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            gemini: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

/// Runtime settings, built once by the caller and passed down explicitly.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials {
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            google_api_key: non_empty_var("GOOGLE_API_KEY"),
            google_search_api_key: non_empty_var("GOOGLE_SEARCH_API_KEY"),
            google_search_engine_id: non_empty_var("GOOGLE_SEARCH_ENGINE_ID"),
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            arxiv: non_empty_var("ARXIV_BASE_URL").unwrap_or(defaults.arxiv),
            arxiv_export: non_empty_var("ARXIV_EXPORT_URL").unwrap_or(defaults.arxiv_export),
            google_search: non_empty_var("GOOGLE_SEARCH_URL").unwrap_or(defaults.google_search),
            openai: non_empty_var("OPENAI_BASE_URL").unwrap_or(defaults.openai),
            anthropic: non_empty_var("ANTHROPIC_BASE_URL").unwrap_or(defaults.anthropic),
            gemini: non_empty_var("GEMINI_BASE_URL").unwrap_or(defaults.gemini),
        };

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = non_empty_var("RETRY_MAX_ATTEMPTS") {
            retry.max_attempts = attempts
                .parse()
                .map_err(|_| AssistError::Config(format!("RETRY_MAX_ATTEMPTS={attempts}")))?;
        }
        if let Some(secs) = non_empty_var("RETRY_DELAY_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| AssistError::Config(format!("RETRY_DELAY_SECS={secs}")))?;
            retry.delay = Duration::from_secs(secs);
        }
        if retry.max_attempts == 0 {
            return Err(AssistError::Config("RETRY_MAX_ATTEMPTS must be at least 1".to_string()));
        }

        Ok(Self { credentials, endpoints, retry })
    }

    /// Point every endpoint at the same base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        self.endpoints = Endpoints {
            arxiv: base.clone(),
            arxiv_export: base.clone(),
            google_search: format!("{base}/customsearch/v1"),
            openai: base.clone(),
            anthropic: base.clone(),
            gemini: base,
        };
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}
