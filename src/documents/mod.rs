//! Uploaded documents and fetched job listings

mod extract;
mod fetch;

pub use extract::{DocumentExtractor, PlainTextExtractor};
pub use fetch::ListingFetcher;
