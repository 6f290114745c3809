//! arXiv identifiers, source archives and metadata.

pub mod metadata;
pub mod source;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AssistError, Result};

pub use metadata::{bibtex_key, fetch_metadata, PaperMetadata};
pub use source::{download_source, extract_archive, fetch_paper, PaperSource};

static PAPER_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"arxiv\.org/(?:abs|pdf|html|e-print|src)/(.+)$").expect("Invalid arXiv URL regex pattern")
});
// New-style `2407.16741v2` or old-style `hep-th/9901001v1`.
static PAPER_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d{4}\.\d{4,5}|[a-z][a-z\-]*(?:\.[A-Za-z\-]+)?/\d{7})(?:v\d+)?$")
        .expect("Invalid arXiv ID regex pattern")
});

/// Extract the paper id from an arXiv URL, or accept a bare id.
///
/// Version suffixes are kept so that a specific revision can be fetched.
pub fn parse_paper_id(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let candidate = match PAPER_URL_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
        Some(rest) => {
            let rest = rest.as_str();
            let rest = rest.split(['?', '#']).next().unwrap_or(rest);
            let rest = rest.trim_end_matches('/');
            rest.strip_suffix(".pdf").unwrap_or(rest)
        }
        None => trimmed.strip_prefix("arXiv:").or_else(|| trimmed.strip_prefix("arxiv:")).unwrap_or(trimmed),
    };

    if PAPER_ID_REGEX.is_match(candidate) {
        Ok(candidate.to_string())
    } else {
        Err(AssistError::InvalidPaperId(input.to_string()))
    }
}

/// File stem used for outputs: `2407.16741` becomes `2407-16741`.
pub fn output_stem(paper_id: &str) -> String {
    paper_id.replace(['.', '/'], "-")
}
