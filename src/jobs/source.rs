//! Job source contract and the HTTP scraper client

use crate::config::{resolve_credential, JobSourceConfig};
use crate::error::{Error, Result};
use crate::jobs::posting::JobPosting;
use crate::profile::JobPreference;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// External job search provider.
///
/// Calls block; the digest runs them on the worker pool.
pub trait JobSource: Send + Sync {
    fn search(&self, preference: &JobPreference) -> Result<Vec<JobPosting>>;
}

/// Query body sent to the scraper service
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    search_term: String,
    location: &'a str,
    sites: &'a [String],
    results_wanted: usize,
    hours_old: u32,
    country: &'a str,
    is_remote: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    jobs: Vec<JobPosting>,
}

/// Job source backed by a scraper service reachable over HTTP
pub struct HttpJobSource {
    config: JobSourceConfig,
    api_key: Option<String>,
}

impl HttpJobSource {
    /// Create a client, resolving the optional bearer token
    pub fn new(config: JobSourceConfig) -> Result<Self> {
        let api_key = match &config.api_key_ref {
            Some(key_ref) => Some(resolve_credential(key_ref)?),
            None => None,
        };
        Ok(Self { config, api_key })
    }

    fn request_body<'a>(&'a self, preference: &'a JobPreference) -> SearchRequest<'a> {
        SearchRequest {
            search_term: preference.search_term(),
            location: &preference.location,
            sites: &self.config.sites,
            results_wanted: self.config.results_wanted,
            hours_old: self.config.hours_old,
            country: &self.config.country,
            is_remote: preference.remote_only,
        }
    }
}

impl JobSource for HttpJobSource {
    fn search(&self, preference: &JobPreference) -> Result<Vec<JobPosting>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| Error::Search(format!("failed to build client: {}", e)))?;

        let mut request = client
            .post(&self.config.endpoint)
            .json(&self.request_body(preference));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| Error::Search(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Search(format!("{}: {}", status, body)));
        }

        let parsed: SearchResponse = response
            .json()
            .map_err(|e| Error::Search(format!("invalid response: {}", e)))?;

        let postings: Vec<JobPosting> = parsed
            .jobs
            .into_iter()
            .map(JobPosting::normalized)
            .filter(|p| !p.url.is_empty())
            .collect();

        tracing::debug!(
            term = %preference.search_term(),
            count = postings.len(),
            "Job search finished"
        );

        Ok(postings)
    }
}
