use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::Settings;
use crate::transcription::{SpeechToText, TranscriptionOutcome, Utterance};

const DEFAULT_DEEPGRAM_ENDPOINT: &str = "https://api.deepgram.com";

pub struct DeepgramClient {
    http: Client,
    api_key: String,
    model: String,
    language: String,
    endpoint: String,
}

impl DeepgramClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.transcription.api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!(
                "Deepgram API key is missing. Set transcription.api_key in config or HUDDLE_DEEPGRAM_API_KEY."
            );
        }

        let endpoint = if settings.transcription.endpoint.trim().is_empty() {
            DEFAULT_DEEPGRAM_ENDPOINT.to_string()
        } else {
            settings
                .transcription
                .endpoint
                .trim()
                .trim_end_matches('/')
                .to_string()
        };

        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(
                    settings.transcription.timeout_secs,
                ))
                .build()
                .context("Failed to build Deepgram HTTP client")?,
            api_key,
            model: settings.transcription.model.trim().to_string(),
            language: settings.transcription.language.trim().to_string(),
            endpoint,
        })
    }

    fn request_url(&self) -> String {
        format!("{}/v1/listen", self.endpoint)
    }
}

fn content_type(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "webm" => "audio/webm",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl SpeechToText for DeepgramClient {
    fn service_name(&self) -> &'static str {
        "deepgram"
    }

    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<TranscriptionOutcome> {
        let response = self
            .http
            .post(self.request_url())
            .query(&[
                ("model", self.model.as_str()),
                ("language", self.language.as_str()),
                ("smart_format", "true"),
                ("punctuate", "true"),
                ("paragraphs", "true"),
                ("diarize", "true"),
                ("utterances", "true"),
                ("numerals", "true"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", content_type(format))
            .body(audio.to_vec())
            .send()
            .await
            .context("Deepgram request failed")?;

        let response = response
            .error_for_status()
            .context("Deepgram returned an error status")?;

        let raw: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Deepgram response")?;

        let parsed: DeepgramResponse = serde_json::from_value(raw.clone())
            .context("Deepgram response did not match the expected shape")?;

        Ok(TranscriptionOutcome {
            raw,
            request_id: parsed.metadata.and_then(|m| m.request_id),
            utterances: parsed
                .results
                .map(extract_utterances)
                .unwrap_or_default(),
        })
    }
}

/// Flatten the diarized response into an utterance list.
///
/// Sentence-level paragraph data carries the speaker tags; plain
/// utterances are the fallback when paragraph grouping is absent.
fn extract_utterances(results: DeepgramResults) -> Vec<Utterance> {
    let mut utterances = Vec::new();

    if let Some(channel) = results.channels.into_iter().next() {
        if let Some(alternative) = channel.alternatives.into_iter().next() {
            if let Some(paragraphs) = alternative.paragraphs {
                for paragraph in paragraphs.paragraphs {
                    let paragraph_speaker = paragraph.speaker;
                    for sentence in paragraph.sentences {
                        utterances.push(Utterance {
                            start: sentence.start,
                            end: sentence.end,
                            text: sentence.text,
                            speaker: sentence.speaker.or(paragraph_speaker),
                            confidence: None,
                        });
                    }
                }
            }
        }
    }

    if utterances.is_empty() {
        for u in results.utterances.unwrap_or_default() {
            utterances.push(Utterance {
                start: u.start,
                end: u.end,
                text: u.transcript,
                speaker: u.speaker,
                confidence: u.confidence,
            });
        }
    }

    utterances
}

#[derive(Debug, Deserialize)]
struct DeepgramResponse {
    metadata: Option<DeepgramMetadata>,
    results: Option<DeepgramResults>,
}

#[derive(Debug, Deserialize)]
struct DeepgramMetadata {
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeepgramResults {
    #[serde(default)]
    channels: Vec<DeepgramChannel>,
    #[serde(default)]
    utterances: Option<Vec<DeepgramUtterance>>,
}

#[derive(Debug, Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
struct DeepgramAlternative {
    paragraphs: Option<DeepgramParagraphs>,
}

#[derive(Debug, Deserialize)]
struct DeepgramParagraphs {
    #[serde(default)]
    paragraphs: Vec<DeepgramParagraph>,
}

#[derive(Debug, Deserialize, Clone)]
struct DeepgramParagraph {
    speaker: Option<u32>,
    #[serde(default)]
    sentences: Vec<DeepgramSentence>,
}

#[derive(Debug, Deserialize, Clone)]
struct DeepgramSentence {
    start: f64,
    end: f64,
    text: String,
    speaker: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DeepgramUtterance {
    start: f64,
    end: f64,
    transcript: String,
    speaker: Option<u32>,
    confidence: Option<f64>,
}
