//! # Reference fetcher
//!
//! Retrieves the reference page for a canonical symptom and reduces it to plain
//! text. Pages live at `<reference_base_url><slug>.html`, where the slug is the
//! lowercased symptom name with all whitespace removed (`"sore throat"` →
//! `sorethroat.html`). Only paragraph and list-item blocks are kept.
//!
//! A failed fetch is never fatal for a request: [`ReferenceFetcher::fetch_all`]
//! logs the failure, records the symptom as skipped and carries on with the rest.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::error::{TriageError, TriageResult};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static CONTENT_BLOCKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, li").expect("valid selector"));

/// Plain text extracted from one reference page.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceText {
    pub symptom: String,
    pub url: String,
    pub text: String,
}

/// Outcome of fetching a batch of symptoms.
#[derive(Debug, Default, Clone)]
pub struct FetchBatch {
    pub fetched: Vec<ReferenceText>,
    /// Symptoms whose page could not be retrieved.
    pub skipped: Vec<String>,
}

impl FetchBatch {
    pub fn texts(&self) -> Vec<&str> {
        self.fetched.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn symptoms(&self) -> Vec<String> {
        self.fetched.iter().map(|r| r.symptom.clone()).collect()
    }
}

pub struct ReferenceFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl ReferenceFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> TriageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriageError::RemoteService(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Lowercase and strip all whitespace.
    pub fn slug(symptom: &str) -> String {
        WHITESPACE
            .replace_all(&symptom.to_lowercase(), "")
            .into_owned()
    }

    pub fn url_for(&self, symptom: &str) -> String {
        format!("{}{}.html", self.base_url, Self::slug(symptom))
    }

    /// Fetch one symptom's page and extract its text.
    ///
    /// # Errors
    /// [`TriageError::Fetch`] on transport errors, timeouts and non-success statuses.
    pub async fn fetch(&self, symptom: &str) -> TriageResult<ReferenceText> {
        let url = self.url_for(symptom);
        info!("Fetching data from: {}", url);

        let fetch_error = |reason: String| TriageError::Fetch {
            symptom: symptom.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_error(format!("Failed to fetch {url} (status {status})")));
        }

        let body = resp.text().await.map_err(|e| fetch_error(e.to_string()))?;

        Ok(ReferenceText {
            symptom: symptom.to_string(),
            url,
            text: extract_text(&body),
        })
    }

    /// Fetch every symptom in order, skipping the ones that fail.
    pub async fn fetch_all(&self, symptoms: &[String]) -> FetchBatch {
        let mut batch = FetchBatch::default();
        for symptom in symptoms {
            match self.fetch(symptom).await {
                Ok(reference) => batch.fetched.push(reference),
                Err(e) => {
                    warn!("Could not fetch {}: {}", symptom, e);
                    batch.skipped.push(symptom.clone());
                }
            }
        }
        batch
    }
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join the non-empty text of every `<p>` and `<li>` block, one per line.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&CONTENT_BLOCKS)
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
