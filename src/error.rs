//! jobpilot error types

use thiserror::Error;

/// jobpilot error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Profile or cache store error
    #[error("Store error: {0}")]
    Store(String),

    /// Conversation session error
    #[error("Session error: {0}")]
    Session(String),

    /// Job source error
    #[error("Search error: {0}")]
    Search(String),

    /// Text generation error. The message is shown to the user verbatim.
    #[error("{0}")]
    Generation(String),

    /// Uploaded document could not be read
    #[error("Document error: {0}")]
    Document(String),

    /// Job link fetch error
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Gateway lifecycle error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Worker pool error (closed pool or panicked task)
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for jobpilot operations
pub type Result<T> = std::result::Result<T, Error>;
