//! Generative-AI summarization.
//!
//! A trait seam over the hosted text-generation endpoint plus the prompts used by
//! the dashboard's analysis and summary commands.

mod gemini;
pub mod prompts;
mod provider;

pub use gemini::{is_placeholder_key, GeminiProvider, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use provider::{AiError, GenerationOptions, Summarizer, MISSING_CREDENTIAL_MESSAGE};
