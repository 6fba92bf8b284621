//! Cover letters for button presses and pasted links
//!
//! Every precondition is checked before the generator is called. The
//! finished letter is sent inline when it fits the channel's message limit
//! and as a text file otherwise; it is never cut.

use super::reference::ActionRef;
use crate::cache::ItemCache;
use crate::documents::ListingFetcher;
use crate::error::{Error, Result};
use crate::generation::{CoverLetterRequest, Generator};
use crate::jobs::JobPosting;
use crate::profile::ProfileStore;
use crate::workers::WorkerPool;
use std::fmt;
use std::sync::Arc;

/// Why a request was turned down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// CV or sample letter missing
    MissingDocuments,
    /// Malformed button payload or one owned by another user
    InvalidReference,
    /// Posting no longer in the user's current batch
    StaleReference,
    /// Listing page could not be loaded
    Fetch(String),
    /// Generator failed; carries its message unchanged
    Generation(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingDocuments => write!(
                f,
                "❌ Bitte zuerst /setup ausführen (Lebenslauf + Muster-Anschreiben)."
            ),
            Rejection::InvalidReference => {
                write!(f, "❌ Ungültiger Button. Bitte /suchenow ausführen.")
            }
            Rejection::StaleReference => {
                write!(f, "❌ Job nicht mehr im Cache. Bitte /suchenow ausführen.")
            }
            Rejection::Fetch(e) => write!(f, "❌ URL konnte nicht geladen werden: {}", e),
            Rejection::Generation(e) => write!(f, "❌ Fehler bei der Generierung: {}", e),
        }
    }
}

/// Outcome of a step that may be turned down
pub type Resolution<T> = std::result::Result<T, Rejection>;

/// The user's two documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    pub reference_document: String,
    pub style_sample: String,
}

/// A request that passed every precondition
#[derive(Debug, Clone)]
pub struct PendingLetter {
    pub request: CoverLetterRequest,
    /// Cached posting, absent for pasted links
    pub posting: Option<JobPosting>,
}

/// A finished letter ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Inline(String),
    Attachment {
        bytes: Vec<u8>,
        filename: String,
        caption: String,
    },
}

impl Delivery {
    /// Inline when header and letter fit `max_chars`, a file otherwise
    pub fn build(posting: Option<&JobPosting>, letter: &str, max_chars: usize) -> Self {
        let rule = "─".repeat(30);
        let header = match posting {
            Some(p) => format!("📄 Anschreiben – {} @ {}\n{}\n\n", p.title, p.company, rule),
            None => format!("📄 Dein Anschreiben:\n{}\n\n", rule),
        };
        let full = format!("{}{}", header, letter);

        if full.chars().count() <= max_chars {
            return Delivery::Inline(full);
        }

        let (filename, caption) = match posting {
            Some(p) => (
                attachment_name(&p.company),
                format!("📄 Dein Anschreiben für {} @ {}", p.title, p.company),
            ),
            None => (
                "Anschreiben.txt".to_string(),
                "📄 Dein Anschreiben (als Datei)".to_string(),
            ),
        };
        Delivery::Attachment {
            bytes: letter.as_bytes().to_vec(),
            filename,
            caption,
        }
    }
}

fn attachment_name(company: &str) -> String {
    let company: String = company
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if company.is_empty() {
        "Anschreiben.txt".to_string()
    } else {
        format!("Anschreiben_{}.txt", company)
    }
}

/// Resolves cover letter requests
pub struct ActionResolver {
    profiles: Arc<dyn ProfileStore>,
    cache: Arc<dyn ItemCache>,
    generator: Arc<dyn Generator>,
    fetcher: ListingFetcher,
    workers: WorkerPool,
}

impl ActionResolver {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        cache: Arc<dyn ItemCache>,
        generator: Arc<dyn Generator>,
        fetcher: ListingFetcher,
        workers: WorkerPool,
    ) -> Self {
        Self {
            profiles,
            cache,
            generator,
            fetcher,
            workers,
        }
    }

    /// First link in a message, if any
    pub fn extract_url(&self, text: &str) -> Option<String> {
        self.fetcher.extract_url(text)
    }

    /// Both documents of a user
    pub async fn documents(&self, user_id: &str) -> Result<Resolution<Documents>> {
        let profile = self.profiles.get_or_default(user_id).await?;
        if !profile.has_documents() {
            tracing::debug!(user = %user_id, "Documents missing");
            return Ok(Err(Rejection::MissingDocuments));
        }
        Ok(Ok(Documents {
            reference_document: profile.reference_document.unwrap_or_default(),
            style_sample: profile.style_sample.unwrap_or_default(),
        }))
    }

    /// Check a button press from `requester_id` carrying `data`
    pub async fn prepare_cached(
        &self,
        requester_id: &str,
        data: &str,
    ) -> Result<Resolution<PendingLetter>> {
        let reference = match ActionRef::parse(data) {
            Some(r) if r.user_id == requester_id => r,
            _ => {
                tracing::debug!(user = %requester_id, data = %data, "Invalid action reference");
                return Ok(Err(Rejection::InvalidReference));
            }
        };

        let documents = match self.documents(&reference.user_id).await? {
            Ok(documents) => documents,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let Some(posting) = self
            .cache
            .get(&reference.user_id, &reference.item_id)
            .await?
        else {
            tracing::debug!(
                user = %reference.user_id,
                item = %reference.item_id,
                "Stale action reference"
            );
            return Ok(Err(Rejection::StaleReference));
        };

        Ok(Ok(PendingLetter {
            request: CoverLetterRequest {
                reference_document: documents.reference_document,
                style_sample: documents.style_sample,
                listing_text: posting.listing_text(),
            },
            posting: Some(posting),
        }))
    }

    /// Load a pasted listing link
    pub async fn prepare_link(&self, documents: Documents, url: &str) -> Resolution<PendingLetter> {
        let listing_text = self.fetcher.fetch(url).await.map_err(|e| {
            tracing::warn!(url = %url, "Listing fetch failed: {}", e);
            Rejection::Fetch(match e {
                Error::Fetch(message) => message,
                other => other.to_string(),
            })
        })?;

        Ok(PendingLetter {
            request: CoverLetterRequest {
                reference_document: documents.reference_document,
                style_sample: documents.style_sample,
                listing_text,
            },
            posting: None,
        })
    }

    /// Run the generator on the worker pool and package the letter
    pub async fn generate(&self, pending: PendingLetter, max_chars: usize) -> Resolution<Delivery> {
        let generator = self.generator.clone();
        let request = pending.request;
        let letter = self
            .workers
            .run("generate", move || generator.generate(&request))
            .await
            .and_then(|result| result)
            .map_err(|e| {
                tracing::warn!("Cover letter generation failed: {}", e);
                Rejection::Generation(e.to_string())
            })?;

        Ok(Delivery::build(pending.posting.as_ref(), &letter, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryItemCache;
    use crate::config::FetchConfig;
    use crate::profile::MemoryProfileStore;
    use crate::testing::{complete_profile, posting, ScriptedGenerator};
    use httpmock::prelude::*;

    struct Fixture {
        profiles: MemoryProfileStore,
        cache: MemoryItemCache,
        generator: Arc<ScriptedGenerator>,
        resolver: ActionResolver,
    }

    fn fixture(generator: ScriptedGenerator) -> Fixture {
        let profiles = MemoryProfileStore::new();
        let cache = MemoryItemCache::new();
        let generator = Arc::new(generator);
        let resolver = ActionResolver::new(
            Arc::new(profiles.clone()),
            Arc::new(cache.clone()),
            generator.clone(),
            ListingFetcher::new(&FetchConfig {
                timeout_secs: 5,
                max_chars: 12_000,
            })
            .unwrap(),
            WorkerPool::new(1),
        );
        Fixture {
            profiles,
            cache,
            generator,
            resolver,
        }
    }

    async fn resolve(f: &Fixture, user: &str, data: &str, max_chars: usize) -> Resolution<Delivery> {
        let pending = f.resolver.prepare_cached(user, data).await.unwrap()?;
        f.resolver.generate(pending, max_chars).await
    }

    #[tokio::test]
    async fn test_cached_posting_inline() {
        let f = fixture(ScriptedGenerator::ok("Sehr geehrte Damen und Herren"));
        f.profiles.put("42", &complete_profile()).await.unwrap();
        let p = posting(1);
        f.cache.replace("42", &[p.clone()]).await.unwrap();

        let data = ActionRef::cover_letter("42", p.id()).encode();
        let delivery = resolve(&f, "42", &data, 4096).await.unwrap();

        match delivery {
            Delivery::Inline(text) => {
                assert!(text.starts_with("📄 Anschreiben – Data Analyst 1 @ Firma 1\n"));
                assert!(text.ends_with("Sehr geehrte Damen und Herren"));
            }
            other => panic!("expected inline delivery, got {:?}", other),
        }

        let request = f.generator.last_request().unwrap();
        assert_eq!(request.reference_document, "Lebenslauf");
        assert_eq!(request.style_sample, "Muster");
        assert!(request.listing_text.starts_with("Stelle: Data Analyst 1\nUnternehmen: Firma 1"));
    }

    #[tokio::test]
    async fn test_missing_style_sample_rejected_before_generation() {
        let f = fixture(ScriptedGenerator::ok("x"));
        let mut profile = complete_profile();
        profile.style_sample = None;
        f.profiles.put("42", &profile).await.unwrap();
        let p = posting(1);
        f.cache.replace("42", &[p.clone()]).await.unwrap();

        let data = ActionRef::cover_letter("42", p.id()).encode();
        assert_eq!(
            resolve(&f, "42", &data, 4096).await,
            Err(Rejection::MissingDocuments)
        );
        assert_eq!(f.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_documents() {
        let f = fixture(ScriptedGenerator::ok("x"));
        assert_eq!(
            f.resolver.documents("7").await.unwrap(),
            Err(Rejection::MissingDocuments)
        );
    }

    #[tokio::test]
    async fn test_documents_require_both() {
        let f = fixture(ScriptedGenerator::ok("x"));
        let mut profile = complete_profile();
        f.profiles.put("42", &profile).await.unwrap();
        let documents = f.resolver.documents("42").await.unwrap().unwrap();
        assert_eq!(documents.reference_document, "Lebenslauf");
        assert_eq!(documents.style_sample, "Muster");

        profile.reference_document = None;
        f.profiles.put("42", &profile).await.unwrap();
        assert_eq!(
            f.resolver.documents("42").await.unwrap(),
            Err(Rejection::MissingDocuments)
        );
    }

    #[tokio::test]
    async fn test_stale_after_replace() {
        let f = fixture(ScriptedGenerator::ok("x"));
        f.profiles.put("42", &complete_profile()).await.unwrap();
        let old = posting(1);
        f.cache.replace("42", &[old.clone()]).await.unwrap();
        f.cache.replace("42", &[posting(2)]).await.unwrap();

        let data = ActionRef::cover_letter("42", old.id()).encode();
        assert_eq!(
            resolve(&f, "42", &data, 4096).await,
            Err(Rejection::StaleReference)
        );
        assert_eq!(f.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_foreign_or_malformed_reference() {
        let f = fixture(ScriptedGenerator::ok("x"));
        f.profiles.put("42", &complete_profile()).await.unwrap();
        let p = posting(1);
        f.cache.replace("42", &[p.clone()]).await.unwrap();

        let data = ActionRef::cover_letter("42", p.id()).encode();
        assert_eq!(
            resolve(&f, "99", &data, 4096).await,
            Err(Rejection::InvalidReference)
        );
        assert_eq!(
            resolve(&f, "42", "garbage", 4096).await,
            Err(Rejection::InvalidReference)
        );
        assert_eq!(f.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_long_letter_becomes_attachment() {
        let letter = "a".repeat(5000);
        let f = fixture(ScriptedGenerator::ok(letter.clone()));
        f.profiles.put("42", &complete_profile()).await.unwrap();
        let mut p = posting(1);
        p.company = "ACME Data/Labs GmbH".to_string();
        f.cache.replace("42", &[p.clone()]).await.unwrap();

        let data = ActionRef::cover_letter("42", p.id()).encode();
        match resolve(&f, "42", &data, 4096).await.unwrap() {
            Delivery::Attachment {
                bytes,
                filename,
                caption,
            } => {
                assert_eq!(bytes, letter.into_bytes());
                assert_eq!(filename, "Anschreiben_ACME_Data_Labs_GmbH.txt");
                assert_eq!(caption, "📄 Dein Anschreiben für Data Analyst 1 @ ACME Data/Labs GmbH");
            }
            other => panic!("expected attachment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generation_error_is_verbatim() {
        let f = fixture(ScriptedGenerator::failing("overloaded_error: Overloaded"));
        f.profiles.put("42", &complete_profile()).await.unwrap();
        let p = posting(1);
        f.cache.replace("42", &[p.clone()]).await.unwrap();

        let data = ActionRef::cover_letter("42", p.id()).encode();
        let rejection = resolve(&f, "42", &data, 4096).await.unwrap_err();
        assert_eq!(
            rejection,
            Rejection::Generation("overloaded_error: Overloaded".to_string())
        );
        assert_eq!(
            rejection.to_string(),
            "❌ Fehler bei der Generierung: overloaded_error: Overloaded"
        );
    }

    #[tokio::test]
    async fn test_link_flow() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/stelle");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body><h1>Rust Entwickler</h1><p>Remote</p></body></html>");
            })
            .await;

        let f = fixture(ScriptedGenerator::ok("Brief"));
        f.profiles.put("42", &complete_profile()).await.unwrap();

        let documents = f.resolver.documents("42").await.unwrap().unwrap();
        let pending = f
            .resolver
            .prepare_link(documents, &server.url("/stelle"))
            .await
            .unwrap();
        assert_eq!(pending.request.listing_text, "Rust Entwickler Remote");
        assert!(pending.posting.is_none());

        let delivery = f.resolver.generate(pending, 4096).await.unwrap();
        assert_eq!(
            delivery,
            Delivery::Inline(format!("📄 Dein Anschreiben:\n{}\n\nBrief", "─".repeat(30)))
        );
    }

    #[tokio::test]
    async fn test_link_fetch_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/weg");
                then.status(404);
            })
            .await;

        let f = fixture(ScriptedGenerator::ok("x"));
        let documents = Documents {
            reference_document: "CV".to_string(),
            style_sample: "Muster".to_string(),
        };
        let result = f.resolver.prepare_link(documents, &server.url("/weg")).await;
        assert!(matches!(result, Err(Rejection::Fetch(_))));
        assert_eq!(f.generator.calls(), 0);
    }

    #[test]
    fn test_link_attachment_name() {
        let delivery = Delivery::build(None, &"b".repeat(50), 20);
        assert!(matches!(
            delivery,
            Delivery::Attachment { ref filename, ref caption, .. }
                if filename == "Anschreiben.txt" && caption == "📄 Dein Anschreiben (als Datei)"
        ));
    }

    #[test]
    fn test_blank_company_name() {
        assert_eq!(attachment_name("  "), "Anschreiben.txt");
        assert_eq!(attachment_name("Foo Bar"), "Anschreiben_Foo_Bar.txt");
    }
}
