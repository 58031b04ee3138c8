//! Application settings management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// General settings
    #[serde(default)]
    pub general: GeneralSettings,

    /// Speech-to-text transcription settings
    #[serde(default)]
    pub transcription: TranscriptionSettings,

    /// LLM settings for transcript cleanup and analysis
    #[serde(default)]
    pub llm: LlmSettings,

    /// Recorder coordination settings
    #[serde(default)]
    pub coordination: CoordinationSettings,

    /// Email delivery settings
    #[serde(default)]
    pub email: EmailSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Data directory for audio blobs and the database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Length of generated meeting join codes
    #[serde(default = "default_meeting_code_length")]
    pub meeting_code_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    /// Transcription provider (deepgram)
    #[serde(default = "default_transcription_provider")]
    pub provider: String,

    /// API key for the transcription service
    #[serde(default)]
    pub api_key: String,

    /// Model to request from the service
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Language for transcription
    #[serde(default = "default_language")]
    pub language: String,

    /// API endpoint (empty = provider default)
    #[serde(default)]
    pub endpoint: String,

    /// Request timeout in seconds; a hung call is treated as retryable
    #[serde(default = "default_transcription_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// LLM provider (openai)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key (for cloud providers)
    #[serde(default)]
    pub api_key: String,

    /// Model used for transcript cleanup (cheap, high-volume)
    #[serde(default = "default_cleanup_model")]
    pub cleanup_model: String,

    /// Model used for structured meeting analysis
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,

    /// API endpoint (empty = provider default)
    #[serde(default)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationSettings {
    /// Recording policy: admin-only (host records) or best-quality
    #[serde(default = "default_policy")]
    pub policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Email provider (sendgrid)
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// API key for the email service
    #[serde(default)]
    pub api_key: String,

    /// From address for outgoing mail
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

// Default value functions

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "huddle", "huddle")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.local/share/huddle"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_meeting_code_length() -> usize {
    8
}

fn default_transcription_provider() -> String {
    "deepgram".to_string()
}

fn default_transcription_model() -> String {
    "nova-2".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_transcription_timeout() -> u64 {
    120
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_cleanup_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_analysis_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_timeout() -> u64 {
    90
}

fn default_policy() -> String {
    "admin-only".to_string()
}

fn default_email_provider() -> String {
    "sendgrid".to_string()
}

fn default_from_address() -> String {
    "meetings@huddle.local".to_string()
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            meeting_code_length: default_meeting_code_length(),
        }
    }
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: default_transcription_provider(),
            api_key: String::new(),
            model: default_transcription_model(),
            language: default_language(),
            endpoint: String::new(),
            timeout_secs: default_transcription_timeout(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: String::new(),
            cleanup_model: default_cleanup_model(),
            analysis_model: default_analysis_model(),
            endpoint: String::new(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for CoordinationSettings {
    fn default() -> Self {
        Self {
            policy: default_policy(),
        }
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            provider: default_email_provider(),
            api_key: String::new(),
            from_address: default_from_address(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            transcription: TranscriptionSettings::default(),
            llm: LlmSettings::default(),
            coordination: CoordinationSettings::default(),
            email: EmailSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("No config file found, using defaults");
            let mut settings = Self::default();
            settings.apply_env_overrides();
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Apply environment variable overrides for service credentials.
    fn apply_env_overrides(&mut self) {
        apply_env_key(&mut self.transcription.api_key, "HUDDLE_DEEPGRAM_API_KEY");
        apply_env_key(&mut self.llm.api_key, "HUDDLE_OPENAI_API_KEY");
        apply_env_key(&mut self.email.api_key, "HUDDLE_SENDGRID_API_KEY");
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "huddle", "huddle")
            .context("Could not determine config directory")?;

        let config_dir = dirs.config_dir();
        Ok(config_dir.join("config.toml"))
    }

    /// Write default configuration to a file
    pub fn write_default(path: &PathBuf) -> Result<()> {
        let settings = Self::default();
        let content = toml::to_string_pretty(&settings)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the database path
    pub fn database_path(&self) -> PathBuf {
        self.general.data_dir.join("huddle.db")
    }

    /// Get the audio blob store root
    pub fn audio_dir(&self) -> PathBuf {
        self.general.data_dir.join("audio")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.general.data_dir)?;
        std::fs::create_dir_all(self.audio_dir())?;
        Ok(())
    }
}

fn apply_env_key(target: &mut String, var: &str) {
    if target.trim().is_empty() {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                *target = key;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_deepgram_nova2() {
        let settings = Settings::default();
        assert_eq!(settings.transcription.provider, "deepgram");
        assert_eq!(settings.transcription.model, "nova-2");
    }

    #[test]
    fn defaults_to_admin_only_policy() {
        let settings = Settings::default();
        assert_eq!(settings.coordination.policy, "admin-only");
    }

    #[test]
    fn cleanup_and_analysis_use_different_models() {
        let settings = Settings::default();
        assert_ne!(settings.llm.cleanup_model, settings.llm.analysis_model);
    }
}
