//! In-crate fakes for the blocking collaborators

use crate::error::{Error, Result};
use crate::generation::{CoverLetterRequest, Generator};
use crate::jobs::{JobPosting, JobSource};
use crate::profile::{JobPreference, UserProfile};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn posting(n: usize) -> JobPosting {
    JobPosting {
        title: format!("Data Analyst {}", n),
        company: format!("Firma {}", n),
        location: "Berlin".to_string(),
        url: format!("https://jobs.example.com/{}", n),
        description: format!("Beschreibung {}", n),
        posted_date: "2026-10-17".to_string(),
        source_site: "linkedin".to_string(),
    }
}

pub(crate) fn preference() -> JobPreference {
    JobPreference {
        role_title: "Data Analyst".to_string(),
        location: "Berlin".to_string(),
        keywords: String::new(),
        remote_only: false,
        alert_hour: 6,
        alert_minute: 0,
    }
}

/// Profile with documents, preference and the alert switched on
pub(crate) fn complete_profile() -> UserProfile {
    UserProfile {
        reference_document: Some("Lebenslauf".to_string()),
        style_sample: Some("Muster".to_string()),
        search_preference: Some(preference()),
        alert_enabled: true,
    }
}

/// Job source returning a fixed list, optionally failing for some queries
#[derive(Default)]
pub(crate) struct StaticJobSource {
    postings: Vec<JobPosting>,
    failing_locations: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticJobSource {
    pub(crate) fn new(postings: Vec<JobPosting>) -> Self {
        Self {
            postings,
            ..Default::default()
        }
    }

    pub(crate) fn fail_for_location(mut self, location: &str) -> Self {
        self.failing_locations.insert(location.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JobSource for StaticJobSource {
    fn search(&self, preference: &JobPreference) -> Result<Vec<JobPosting>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_locations.contains(&preference.location) {
            return Err(Error::Search("board unavailable".to_string()));
        }
        Ok(self.postings.clone())
    }
}

/// Generator returning scripted results and remembering its requests
pub(crate) struct ScriptedGenerator {
    result: std::result::Result<String, String>,
    requests: Mutex<Vec<CoverLetterRequest>>,
}

impl ScriptedGenerator {
    pub(crate) fn ok(text: impl Into<String>) -> Self {
        Self {
            result: Ok(text.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub(crate) fn last_request(&self) -> Option<CoverLetterRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &CoverLetterRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.result.clone().map_err(Error::Generation)
    }
}
