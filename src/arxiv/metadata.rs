use feed_rs::model::Entry;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde::Serialize;

use crate::config::Settings;
use crate::error::{AssistError, Result};
use crate::retry::retry_blocking;

static NON_ALNUM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("Invalid alphanumeric regex pattern"));

const TITLE_KEY_LEN: usize = 32;

/// Metadata of one arXiv paper, with a generated BibTeX entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperMetadata {
    pub arxiv_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub abstract_url: String,
    pub pdf_url: String,
    pub tex_url: String,
    pub authors: Vec<String>,
    pub year: String,
    pub primary_class: String,
    pub bibtex: String,
}

/// Citation key: first author's last name, year, then up to 32 alphanumerics of the title.
///
/// `(["Jane Smith"], "2023", "My Title: Goes Here")` gives `smith2023mytitlegoeshere`.
pub fn bibtex_key(authors: &[String], year: &str, title: &str) -> String {
    let last_name = authors
        .first()
        .and_then(|author| author.split_whitespace().last())
        .unwrap_or("unknown")
        .to_lowercase();
    let simplified_title = NON_ALNUM_REGEX.replace_all(&title.to_lowercase(), "").into_owned();
    let truncated: String = simplified_title.chars().take(TITLE_KEY_LEN).collect();
    format!("{last_name}{year}{truncated}")
}

impl PaperMetadata {
    /// `@misc` entry describing the preprint.
    pub fn to_bibtex(&self) -> String {
        let key = bibtex_key(&self.authors, &self.year, &self.title);
        format!(
            "@misc{{{key},\n  title={{{title}}},\n  author={{{authors}}},\n  year={{{year}}},\n  eprint={{{id}}},\n  archivePrefix={{arXiv}},\n  primaryClass={{{class}}},\n  url={{{url}}}\n}}",
            key = key,
            title = self.title,
            authors = self.authors.join(" and "),
            year = self.year,
            id = self.arxiv_id,
            class = self.primary_class,
            url = self.abstract_url,
        )
    }
}

/// Fetch metadata for `arxiv_id` from the arXiv query API. `None` if the API knows no such paper.
pub fn fetch_metadata(settings: &Settings, client: &Client, arxiv_id: &str) -> Result<Option<PaperMetadata>> {
    let url = format!(
        "{}/api/query?search_query=id:{}",
        settings.endpoints.arxiv_export.trim_end_matches('/'),
        arxiv_id
    );

    let body = retry_blocking(&settings.retry, || {
        info!("Querying arXiv API for paper: {}", arxiv_id);
        let response = client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssistError::Status {
                service: "arXiv API".to_string(),
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(response.bytes()?.to_vec())
    })?;

    parse_feed(&body, arxiv_id, &settings.endpoints.arxiv)
}

/// Build metadata from the first entry of an arXiv Atom feed.
pub fn parse_feed(xml: &[u8], arxiv_id: &str, arxiv_base: &str) -> Result<Option<PaperMetadata>> {
    let feed = feed_rs::parser::parse(xml)
        .map_err(|e| AssistError::MalformedResponse(format!("arXiv Atom feed: {e}")))?;
    let Some(entry) = feed.entries.first() else {
        debug!("arXiv API returned no entry for {}", arxiv_id);
        return Ok(None);
    };
    Ok(Some(metadata_from_entry(entry, arxiv_id, arxiv_base)))
}

fn metadata_from_entry(entry: &Entry, arxiv_id: &str, arxiv_base: &str) -> PaperMetadata {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let abstract_text = entry
        .summary
        .as_ref()
        .map(|s| s.content.trim().to_string())
        .unwrap_or_default();

    let mut abstract_url = String::new();
    let mut pdf_url = String::new();
    let mut tex_url = String::new();
    for link in &entry.links {
        if link.rel.as_deref() == Some("alternate") {
            abstract_url = link.href.clone();
        }
        if link.media_type.as_deref() == Some("application/pdf") {
            pdf_url = link.href.clone();
        }
        if link
            .title
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains("source"))
        {
            tex_url = link.href.clone();
        }
    }
    if tex_url.is_empty() {
        tex_url = format!("{}/src/{}", arxiv_base.trim_end_matches('/'), arxiv_id);
    }

    let authors: Vec<String> = entry
        .authors
        .iter()
        .map(|a| a.name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    let year = entry
        .published
        .map(|d| d.format("%Y").to_string())
        .unwrap_or_default();
    let primary_class = entry
        .categories
        .first()
        .map(|c| c.term.clone())
        .unwrap_or_default();

    let mut metadata = PaperMetadata {
        arxiv_id: arxiv_id.to_string(),
        title,
        abstract_text,
        abstract_url,
        pdf_url,
        tex_url,
        authors,
        year,
        primary_class,
        bibtex: String::new(),
    };
    metadata.bibtex = metadata.to_bibtex();
    metadata
}
