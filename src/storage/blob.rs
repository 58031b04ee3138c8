//! Audio blob storage
//!
//! Recordings are stored by relative path (`recordings/user_X/meeting_Y/file`).
//! The transcription engine only ever uses exists/read/list, so a remote
//! object store can stand in for the local filesystem implementation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Path-addressed binary store for audio payloads
pub trait AudioStore: Send + Sync {
    /// Whether a payload exists at the given path
    fn exists(&self, path: &str) -> bool;

    /// Read the full payload
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write a payload, creating parent directories as needed
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// List file names directly under a directory
    fn list_dir(&self, dir: &str) -> Result<Vec<String>>;
}

/// Local filesystem implementation rooted at a base directory
pub struct LocalAudioStore {
    root: PathBuf,
}

impl LocalAudioStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl AudioStore for LocalAudioStore {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        std::fs::read(&full).with_context(|| format!("Failed to read audio: {}", full.display()))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, data)
            .with_context(|| format!("Failed to write audio: {}", full.display()))
    }

    fn list_dir(&self, dir: &str) -> Result<Vec<String>> {
        let full = self.resolve(dir);
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&full)
            .with_context(|| format!("Cannot list directory: {}", full.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Split a store path into (directory, base name without extension)
pub fn split_blob_path(path: &str) -> (String, String) {
    let p = Path::new(path);
    let dir = p
        .parent()
        .map(|d| d.to_string_lossy().to_string())
        .unwrap_or_default();
    let base = p
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    (dir, base)
}
