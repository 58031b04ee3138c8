//! huddle - Coordinated meeting recording, diarized transcription, and
//! AI-generated meeting minutes.
//!
//! The core pipeline: an uploaded recording is transcribed with speaker
//! diarization, segments are merged across a meeting's recordings into one
//! time-ordered transcript, and once every recording is done an AI pass
//! produces a cleaned transcript and structured minutes.

pub mod cli;
pub mod config;
pub mod coordination;
pub mod email;
pub mod llm;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod transcription;

use thiserror::Error;

/// Main error type for huddle
#[derive(Error, Debug)]
pub enum HuddleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HuddleError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "huddle";
