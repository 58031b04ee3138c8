//! Chat-completion access for transcript cleanup and meeting analysis
//!
//! Call sites see the `ChatModel` trait only; the configured provider
//! decides the implementation.

mod openai;
pub mod prompts;

pub use openai::OpenAiClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Settings;

/// One chat-completion request
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the assistant message text.
    async fn complete(&self, request: ChatRequest<'_>) -> Result<String>;
}

/// Build a chat-completion backend from runtime settings.
pub fn build_chat_model(settings: &Settings) -> Result<Box<dyn ChatModel>> {
    match settings.llm.provider.to_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiClient::from_settings(settings)?)),
        other => anyhow::bail!(
            "Unsupported llm.provider '{}'. Supported providers: openai",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_provider_returns_error() {
        let mut settings = Settings::default();
        settings.llm.provider = "unknown".to_string();

        let err = match build_chat_model(&settings) {
            Ok(_) => panic!("expected chat model creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("Unsupported llm.provider"));
    }

    #[test]
    fn openai_requires_api_key() {
        let settings = Settings::default();

        let err = match build_chat_model(&settings) {
            Ok(_) => panic!("expected chat model creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("OpenAI API key is missing"));
    }
}
