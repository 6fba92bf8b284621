//! Profile record types

use serde::{Deserialize, Serialize};

/// Durable per-user record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// CV text used as the factual basis of cover letters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_document: Option<String>,

    /// Sample cover letter whose tone and structure are imitated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_sample: Option<String>,

    /// Saved job search preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_preference: Option<JobPreference>,

    /// Daily digest toggle
    #[serde(default)]
    pub alert_enabled: bool,
}

impl UserProfile {
    /// Both documents needed for cover letter generation are present
    pub fn has_documents(&self) -> bool {
        self.reference_document.is_some() && self.style_sample.is_some()
    }

    /// The user receives the scheduled digest
    pub fn eligible_for_digest(&self) -> bool {
        self.alert_enabled && self.search_preference.is_some()
    }
}

/// Saved job search preferences. Replaced as a whole when the preference
/// flow runs again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPreference {
    #[serde(rename = "title")]
    pub role_title: String,
    pub location: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(rename = "remote", default)]
    pub remote_only: bool,
    #[serde(rename = "hour")]
    pub alert_hour: u8,
    #[serde(rename = "minute")]
    pub alert_minute: u8,
}

impl JobPreference {
    /// Free-text search term: role title followed by extra keywords
    pub fn search_term(&self) -> String {
        format!("{} {}", self.role_title, self.keywords)
            .trim()
            .to_string()
    }
}
