//! Research-assistant toolkit: arXiv TeX sources to Markdown, arXiv search with
//! BibTeX enrichment, and a uniform front end over several LLM vendors.

pub mod arxiv;
pub mod config;
pub mod convert;
pub mod error;
pub mod latex;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod search;

pub use config::Settings;
pub use error::{AssistError, Result};
pub use latex::{flatten, Diagnostic, FlattenOptions, Flattened};
pub use pipeline::{arxiv_to_markdown, ConversionOutput};

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("arxiv-assist/", env!("CARGO_PKG_VERSION"));
