//! Cover letter generation
//!
//! The generator is an external text generation service. Calls block and
//! run on the worker pool; an error message from the service is passed to
//! the user unchanged.

mod anthropic;
mod prompt;

pub use anthropic::AnthropicGenerator;
pub use prompt::cover_letter_prompt;

use crate::error::Result;

/// Inputs for one cover letter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverLetterRequest {
    /// The applicant's CV
    pub reference_document: String,
    /// Sample letter whose tone is imitated
    pub style_sample: String,
    /// Listing the letter responds to
    pub listing_text: String,
}

/// External text generation service
pub trait Generator: Send + Sync {
    /// Write a cover letter, returning its body text
    fn generate(&self, request: &CoverLetterRequest) -> Result<String>;
}
