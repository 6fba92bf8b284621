//! Job postings and the external job source

mod posting;
mod source;

pub use posting::{JobPosting, MAX_DESCRIPTION_CHARS};
pub use source::{HttpJobSource, JobSource};
