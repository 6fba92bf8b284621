//! Anthropic Messages API client

use super::{cover_letter_prompt, CoverLetterRequest, Generator};
use crate::config::{resolve_credential, GenerationConfig};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generator backed by the Anthropic Messages API
pub struct AnthropicGenerator {
    config: GenerationConfig,
    api_key: String,
}

impl AnthropicGenerator {
    /// Create a generator, resolving the API key from the environment
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let api_key = resolve_credential(&config.api_key_ref)?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Create a generator with an explicit API key
    pub fn with_api_key(config: GenerationConfig, api_key: impl Into<String>) -> Self {
        Self {
            config,
            api_key: api_key.into(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

impl Generator for AnthropicGenerator {
    fn generate(&self, request: &CoverLetterRequest) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| Error::Generation(format!("HTTP client error: {}", e)))?;

        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{"role": "user", "content": cover_letter_prompt(request)}],
        });

        let response = client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .map_err(|e| Error::Generation(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .map_err(|e| Error::Generation(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&raw)
                .map(|e| format!("{}: {}", e.error.kind, e.error.message))
                .unwrap_or_else(|_| format!("{}: {}", status, raw));
            return Err(Error::Generation(message));
        }

        let parsed: MessagesResponse = serde_json::from_str(&raw)
            .map_err(|e| Error::Generation(format!("invalid response: {}", e)))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .ok_or_else(|| Error::Generation("response contained no text".to_string()))?;

        tracing::debug!(
            model = %self.config.model,
            chars = text.chars().count(),
            "Cover letter generated"
        );

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> CoverLetterRequest {
        CoverLetterRequest {
            reference_document: "CV".to_string(),
            style_sample: "Muster".to_string(),
            listing_text: "Stelle".to_string(),
        }
    }

    fn generator(server: &MockServer) -> AnthropicGenerator {
        AnthropicGenerator::with_api_key(
            GenerationConfig {
                base_url: server.base_url(),
                timeout_secs: 5,
                ..Default::default()
            },
            "test-key",
        )
    }

    #[test]
    fn test_generate_returns_first_text_block() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "test-key")
                .header("anthropic-version", "2023-06-01")
                .json_body_includes(json!({"max_tokens": 2048}).to_string());
            then.status(200).json_body(json!({
                "id": "msg_1",
                "type": "message",
                "content": [{"type": "text", "text": "Sehr geehrte Damen und Herren"}],
                "stop_reason": "end_turn"
            }));
        });

        let text = generator(&server).generate(&request()).unwrap();
        assert_eq!(text, "Sehr geehrte Damen und Herren");
        mock.assert();
    }

    #[test]
    fn test_api_error_is_reported_verbatim() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(529).json_body(json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            }));
        });

        let err = generator(&server).generate(&request()).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(err.to_string(), "overloaded_error: Overloaded");
    }

    #[test]
    fn test_missing_text_block() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).json_body(json!({"content": []}));
        });

        assert!(generator(&server).generate(&request()).is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let result = AnthropicGenerator::new(GenerationConfig {
            api_key_ref: "JOBPILOT_TEST_SURELY_UNSET_KEY".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
