//! arXiv search through Google Custom Search, enriched with arXiv metadata.

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::arxiv::metadata::{fetch_metadata, PaperMetadata};
use crate::arxiv::source::blocking_client;
use crate::config::Settings;
use crate::error::{AssistError, Result};
use crate::retry::retry_blocking;

pub const DEFAULT_MAX_RESULTS: usize = 30;
/// Custom Search returns at most this many items per request.
pub const PAGE_SIZE: usize = 10;

static ARXIV_URL_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"arxiv\.org/(?:pdf|html|abs)/(\d{4}\.\d+)(v\d+)?").expect("Invalid arXiv URL regex pattern")
});

/// One Google result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// A paper found by search, with every snippet that pointed at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperRecord {
    #[serde(flatten)]
    pub metadata: PaperMetadata,
    pub snippets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Search Google (restricted to arXiv by the configured engine), up to `max_results` hits.
pub fn google_search(settings: &Settings, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let credentials = &settings.credentials;
    let (Some(api_key), Some(engine_id)) = (
        credentials.google_search_api_key.as_deref(),
        credentials.google_search_engine_id.as_deref(),
    ) else {
        return Err(AssistError::MissingCredentials(
            "GOOGLE_SEARCH_API_KEY and GOOGLE_SEARCH_ENGINE_ID must be set".to_string(),
        ));
    };

    let client = blocking_client()?;
    let mut results = Vec::new();
    for start in (1..=max_results).step_by(PAGE_SIZE) {
        let start_param = start.to_string();
        let num_param = PAGE_SIZE.to_string();
        let page: SearchPage = retry_blocking(&settings.retry, || {
            info!("Google search for {:?}, results from {}", query, start);
            let response = client
                .get(&settings.endpoints.google_search)
                .query(&[
                    ("key", api_key),
                    ("cx", engine_id),
                    ("q", query),
                    ("start", start_param.as_str()),
                    ("num", num_param.as_str()),
                ])
                .send()?;
            let status = response.status();
            if !status.is_success() {
                return Err(AssistError::Status {
                    service: "Google Custom Search".to_string(),
                    status: status.as_u16(),
                    body: response.text().unwrap_or_default(),
                });
            }
            Ok(response.json()?)
        })?;

        let count = page.items.len();
        results.extend(page.items.into_iter().map(|item| SearchHit {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
        }));

        if count < PAGE_SIZE {
            break;
        }
    }
    Ok(results)
}

/// The arXiv id in a paper URL, without version suffix.
pub fn extract_arxiv_id(url: &str) -> Option<String> {
    ARXIV_URL_ID_REGEX
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Group hits by arXiv id, in order of first appearance, keeping every snippet.
pub fn group_by_arxiv_id(hits: &[SearchHit]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for hit in hits {
        let Some(arxiv_id) = extract_arxiv_id(&hit.url) else {
            continue;
        };
        let slot = *index.entry(arxiv_id.clone()).or_insert_with(|| {
            groups.push((arxiv_id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(hit.snippet.clone());
    }
    groups
}

/// Fetch metadata for every distinct arXiv paper among `hits`.
///
/// Papers the arXiv API does not know are dropped.
pub fn collect_papers(settings: &Settings, hits: &[SearchHit]) -> Result<Vec<PaperRecord>> {
    let client: Client = blocking_client()?;
    let mut papers = Vec::new();
    for (arxiv_id, snippets) in group_by_arxiv_id(hits) {
        match fetch_metadata(settings, &client, &arxiv_id)? {
            Some(metadata) => papers.push(PaperRecord { metadata, snippets }),
            None => warn!("No arXiv metadata for {}, skipping", arxiv_id),
        }
    }
    Ok(papers)
}

/// Search and enrich in one step.
pub fn search_papers(settings: &Settings, query: &str, max_results: usize) -> Result<Vec<PaperRecord>> {
    let hits = google_search(settings, query, max_results)?;
    info!("Number of raw Google results: {}", hits.len());
    let papers = collect_papers(settings, &hits)?;
    info!("Number of arXiv results: {}", papers.len());
    Ok(papers)
}
