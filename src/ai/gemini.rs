//! Gemini `generateContent` provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::{AiError, GenerationOptions, Summarizer};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Prefix of the placeholder value shipped in sample configs.
const PLACEHOLDER_KEY_PREFIX: &str = "PASTE_YOUR";

/// Returns true when `key` cannot possibly authenticate a request.
pub fn is_placeholder_key(key: Option<&str>) -> bool {
    match key.map(str::trim) {
        None => true,
        Some(key) => key.is_empty() || key.starts_with(PLACEHOLDER_KEY_PREFIX),
    }
}

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiProvider {
    /// # Arguments
    /// * `base_url` - API root, e.g. "https://generativelanguage.googleapis.com/v1beta".
    /// * `model` - Model name, e.g. "gemini-2.0-flash".
    /// * `api_key` - API key; missing or placeholder keys disable the provider.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            model: model.into(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        !is_placeholder_key(self.api_key.as_deref())
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Summarizer for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, AiError> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !is_placeholder_key(Some(key)) => key,
            _ => return Err(AiError::MissingCredential),
        };

        let request = GenerateContentRequest::user_prompt(prompt);
        debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), "generateContent failed: {}", message);
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("Failed to parse Gemini response: {}", e)))?;

        body.first_text()
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn user_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Result<String, AiError> {
        let candidate = self.candidates.into_iter().next().ok_or(AiError::NoCandidates)?;
        candidate
            .content
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| AiError::InvalidResponse("Candidate has no text part".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = GenerateContentRequest::user_prompt("hello");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"contents": [{"role": "user", "parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn test_first_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "ok"}]}}]
        }))
        .unwrap();
        assert_eq!(response.first_text().unwrap(), "ok");
    }

    #[test]
    fn test_no_candidates() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(response.first_text(), Err(AiError::NoCandidates)));
    }

    #[test]
    fn test_placeholder_keys() {
        assert!(is_placeholder_key(None));
        assert!(is_placeholder_key(Some("  ")));
        assert!(is_placeholder_key(Some("PASTE_YOUR_GEMINI_API_KEY_HERE")));
        assert!(!is_placeholder_key(Some("AIzaSyExample")));
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits_without_network() {
        // Unroutable base URL: any request attempt would surface as a connection error
        let provider = GeminiProvider::new("http://127.0.0.1:9", DEFAULT_GEMINI_MODEL, None);
        let err = provider
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::MissingCredential));
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_api_error_display() {
        let err = AiError::Api {
            status: 500,
            message: "Internal error encountered.".to_string(),
        };
        assert_eq!(err.to_string(), "API Error: 500 - Internal error encountered.");
    }
}
