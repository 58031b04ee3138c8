//! Transcription module for huddle
//!
//! Speech-to-text with speaker diarization via an external service.
//! The backend is polymorphic: call sites only see the `SpeechToText`
//! trait and the configuration decides the implementation.

mod deepgram;
mod engine;

pub use deepgram::DeepgramClient;
pub use engine::{identify_speaker, TranscriptionEngine};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Settings;

/// One diarized utterance returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
    /// Diarization speaker index (0-based), if available
    pub speaker: Option<u32>,
    /// Confidence score, if the service reports one
    pub confidence: Option<f64>,
}

/// Parsed transcription result plus the verbatim payload for audit
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    /// Raw service response, persisted unmodified
    pub raw: serde_json::Value,
    /// Service-side request id, if reported
    pub request_id: Option<String>,
    /// Diarized utterances in producer order
    pub utterances: Vec<Utterance>,
}

/// Diarizing speech-to-text backend
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Stable identifier persisted with each processed recording
    fn service_name(&self) -> &'static str;

    /// Transcribe a raw audio payload. Format concerns (sample rate,
    /// channels) are delegated entirely to the service.
    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<TranscriptionOutcome>;
}

/// Build a speech-to-text backend from runtime settings.
pub fn build_transcriber(settings: &Settings) -> Result<Box<dyn SpeechToText>> {
    match settings.transcription.provider.to_lowercase().as_str() {
        "deepgram" => Ok(Box::new(DeepgramClient::from_settings(settings)?)),
        other => anyhow::bail!(
            "Unsupported transcription.provider '{}'. Supported providers: deepgram",
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
        settings.transcription.provider = "unknown".to_string();

        let err = match build_transcriber(&settings) {
            Ok(_) => panic!("expected transcriber creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("Unsupported transcription.provider"));
    }

    #[test]
    fn deepgram_requires_api_key() {
        let settings = Settings::default();

        let err = match build_transcriber(&settings) {
            Ok(_) => panic!("expected transcriber creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("Deepgram API key is missing"));
    }
}
