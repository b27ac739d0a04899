//! Summarizer trait definition.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Shown instead of an AI answer when no usable credential is configured.
pub const MISSING_CREDENTIAL_MESSAGE: &str = "Error: Please add your Gemini API key \
(the `ai.api_key` setting or the GEMINI_API_KEY environment variable) to enable AI features.";

/// Options for a generation request.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }
}

/// Errors that can occur when asking the summarization service for text.
#[derive(Debug, Error)]
pub enum AiError {
    /// No key, or the placeholder key, is configured. No request was made.
    #[error("{}", MISSING_CREDENTIAL_MESSAGE)]
    MissingCredential,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API Error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse the response from the AI model.")]
    NoCandidates,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Stateless prompt-in, text-out generation endpoint.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Provider name (e.g., "gemini").
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Generate a single text answer for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, AiError>;
}
