use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the library.
///
/// Non-fatal conditions met while flattening a document (missing or circular
/// inclusions, missing body markers) are not errors; they are reported as
/// [`crate::latex::Diagnostic`] values next to the result.
#[derive(Error, Debug)]
pub enum AssistError {
    #[error("No candidate entry document found under {0:?}")]
    NoCandidate(PathBuf),

    #[error("Circular inclusion of {0:?}")]
    CircularInclusion(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{service} returned status {status}: {body}")]
    Status { service: String, status: u16, body: String },

    #[error("Not a valid arXiv paper URL or ID: {0}")]
    InvalidPaperId(String),

    #[error("Received empty source archive for paper {0}")]
    EmptySource(String),

    #[error("Failed to extract source archive: {0}")]
    Archive(String),

    #[error("Markdown conversion failed: {0}")]
    Converter(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Model {model} is not supported. Supported models: {supported}")]
    UnsupportedModel { model: String, supported: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AssistError {
    /// Whether retrying the failed call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AssistError::Network(e) => !e.is_decode() && !e.is_builder(),
            AssistError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<zip::result::ZipError> for AssistError {
    fn from(err: zip::result::ZipError) -> Self {
        AssistError::Archive(err.to_string())
    }
}

pub type Result<T, E = AssistError> = std::result::Result<T, E>;
