//! Canonical job posting

use crate::cache::job_id;
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum description length kept per posting, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 4000;

/// One job listing normalized into the canonical shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(default, alias = "job_url", deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, alias = "date_posted", deserialize_with = "lenient_string")]
    pub posted_date: String,
    #[serde(default, alias = "site", deserialize_with = "lenient_string")]
    pub source_site: String,
}

impl JobPosting {
    /// Trim every field and bound the description
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.title,
            &mut self.company,
            &mut self.location,
            &mut self.url,
            &mut self.posted_date,
            &mut self.source_site,
        ] {
            *field = field.trim().to_string();
        }
        self.description = self
            .description
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect::<String>()
            .trim()
            .to_string();
        self
    }

    /// Content-derived identity, see [`job_id`]
    pub fn id(&self) -> String {
        job_id(&self.title, &self.company, &self.url)
    }

    /// Text handed to the generator as the job description
    pub fn listing_text(&self) -> String {
        format!(
            "Stelle: {}\nUnternehmen: {}\nOrt: {}\n\nBeschreibung:\n{}",
            self.title, self.company, self.location, self.description
        )
    }

    /// Icon shown next to the posting in a digest
    pub fn site_icon(&self) -> &'static str {
        match self.source_site.to_lowercase().as_str() {
            "linkedin" => "💼",
            "indeed" => "🔍",
            "glassdoor" => "🏢",
            _ => "📌",
        }
    }
}

/// Accept strings, numbers and null for text columns. Scraper rows carry
/// NaN-like nulls for missing fields.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
