//! Transcription engine: one recording in, ordered segments out
//!
//! Drives the per-recording state machine
//! `Pending -> Processing -> {Processed | Failed}` around a diarizing
//! speech-to-text backend, with a fixed retry budget and a storage
//! fallback lookup for misplaced audio files.

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::storage::{
    split_blob_path, AudioStore, Database, LocalAudioStore, ProcessingState, Recording, Segment,
};
use crate::transcription::{build_transcriber, SpeechToText};

/// Total attempts per recording, covering transport errors and empty results
const MAX_ATTEMPTS: u32 = 3;

/// Transcribes uploaded recordings into diarized segments
pub struct TranscriptionEngine {
    transcriber: Box<dyn SpeechToText>,
    store: Box<dyn AudioStore>,
}

impl TranscriptionEngine {
    /// Create an engine with explicit backends (used by tests)
    pub fn new(transcriber: Box<dyn SpeechToText>, store: Box<dyn AudioStore>) -> Self {
        Self { transcriber, store }
    }

    /// Create an engine from runtime settings.
    ///
    /// Missing credentials fail here, before any work is claimed.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            transcriber: build_transcriber(settings)?,
            store: Box::new(LocalAudioStore::new(settings.audio_dir())),
        })
    }

    /// Process one recording end to end.
    ///
    /// Returns Ok(true) when the recording reaches Processed, Ok(false) when
    /// it could not be claimed or failed after exhausting retries. Re-running
    /// on an already processed recording is a no-op.
    pub async fn process_recording(&self, db: &Database, recording_id: &str) -> Result<bool> {
        let Some(recording) = db.get_recording(recording_id)? else {
            anyhow::bail!("Recording {} not found", recording_id);
        };

        if recording.state == ProcessingState::Processed {
            info!("Recording {} already processed, skipping", recording_id);
            return Ok(true);
        }

        if !db.begin_processing(recording_id)? {
            // Claimed by another task, or terminal until manually re-queued
            warn!(
                "Recording {} not claimable in state {}",
                recording_id,
                recording.state.as_str()
            );
            return Ok(false);
        }

        let mut recording = db
            .get_recording(recording_id)?
            .unwrap_or(recording);

        for attempt in 1..=MAX_ATTEMPTS {
            info!(
                "Starting transcription for recording {} (attempt {})",
                recording.id, attempt
            );

            match self.attempt(db, &mut recording).await {
                Ok(Some(segment_count)) => {
                    recording.state = ProcessingState::Processed;
                    recording.processing_completed_at = Some(Utc::now());
                    db.update_recording(&recording)?;

                    info!(
                        "Transcription completed for recording {} - {} segments created",
                        recording.id, segment_count
                    );
                    return Ok(true);
                }
                Ok(None) => {
                    warn!(
                        "No results from transcription service for {} (attempt {})",
                        recording.id, attempt
                    );
                }
                Err(e) => {
                    warn!(
                        "Transcription error for {} (attempt {}): {}",
                        recording.id, attempt, e
                    );
                }
            }
        }

        error!(
            "Transcription failed for {} after {} attempts",
            recording.id, MAX_ATTEMPTS
        );
        recording.state = ProcessingState::Failed;
        db.update_recording(&recording)?;

        Ok(false)
    }

    /// One transcription attempt. Ok(None) means an empty service result.
    async fn attempt(&self, db: &Database, recording: &mut Recording) -> Result<Option<usize>> {
        self.resolve_audio_path(db, recording)?;

        let audio = self.store.read(&recording.audio_path)?;
        info!(
            "Read {:.1} KB from storage for recording {}",
            audio.len() as f64 / 1024.0,
            recording.id
        );

        let outcome = self.transcriber.transcribe(&audio, &recording.format).await?;

        recording.transcription_raw = Some(outcome.raw);
        recording.transcription_service = Some(self.transcriber.service_name().to_string());
        recording.service_request_id = outcome.request_id;

        if outcome.utterances.is_empty() {
            return Ok(None);
        }

        let segments: Vec<Segment> = outcome
            .utterances
            .into_iter()
            .map(|u| {
                let speaker_label = u.speaker.map(|s| format!("speaker_{}", s));
                let mut segment =
                    Segment::new(recording.id.clone(), u.start, u.end, u.text);
                segment.confidence = u.confidence;
                segment.speaker_name = Some(identify_speaker(speaker_label.as_deref()));
                segment.speaker_label = speaker_label;
                segment
            })
            .collect();

        let count = segments.len();
        db.insert_segments(&segments)?;

        Ok(Some(count))
    }

    /// Verify the audio payload exists, falling back to a directory scan
    /// for a file sharing the base name (uploads occasionally land with a
    /// suffixed name).
    fn resolve_audio_path(&self, db: &Database, recording: &mut Recording) -> Result<()> {
        if self.store.exists(&recording.audio_path) {
            return Ok(());
        }

        warn!("Audio file not found in storage: {}", recording.audio_path);

        let (dir, base) = split_blob_path(&recording.audio_path);
        let suffix = format!(".{}", recording.format);

        let alternative = self
            .store
            .list_dir(&dir)
            .unwrap_or_default()
            .into_iter()
            .find(|name| name.contains(&base) && name.ends_with(&suffix));

        match alternative {
            Some(name) => {
                let path = format!("{}/{}", dir, name);
                info!("Found alternative audio file: {}", path);
                recording.audio_path = path;
                db.update_recording(recording)?;
                Ok(())
            }
            None => anyhow::bail!(
                "Audio file not found in storage: {}",
                recording.audio_path
            ),
        }
    }
}

/// Map a diarization label to a display name.
///
/// Voice-profile matching could slot in here; for now labels become
/// friendly 1-based speaker numbers.
pub fn identify_speaker(speaker_label: Option<&str>) -> String {
    let Some(label) = speaker_label else {
        return "Unknown Speaker".to_string();
    };

    match label.trim_start_matches("speaker_").parse::<u32>() {
        Ok(n) => format!("Speaker {}", n + 1),
        Err(_) => label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Meeting, Participant};
    use crate::transcription::{TranscriptionOutcome, Utterance};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Scripted transcriber: pops one canned response per call
    struct ScriptedTranscriber {
        calls: Arc<AtomicUsize>,
        script: Mutex<Vec<Result<TranscriptionOutcome>>>,
    }

    impl ScriptedTranscriber {
        fn new(script: Vec<Result<TranscriptionOutcome>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    script: Mutex::new(script),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl SpeechToText for ScriptedTranscriber {
        fn service_name(&self) -> &'static str {
            "scripted"
        }

        async fn transcribe(&self, _audio: &[u8], _format: &str) -> Result<TranscriptionOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                anyhow::bail!("scripted transcriber exhausted");
            }
            script.remove(0)
        }
    }

    fn outcome(utterances: Vec<Utterance>) -> TranscriptionOutcome {
        TranscriptionOutcome {
            raw: serde_json::json!({ "scripted": true }),
            request_id: Some("req-1".to_string()),
            utterances,
        }
    }

    fn utterance(start: f64, end: f64, text: &str, speaker: u32) -> Utterance {
        Utterance {
            start,
            end,
            text: text.to_string(),
            speaker: Some(speaker),
            confidence: None,
        }
    }

    fn seed(db: &Database, audio_path: &str) -> Recording {
        let mut meeting = Meeting::new("Sync".to_string(), Some("alice".to_string()), 8);
        meeting.id = db.insert_meeting(&meeting).unwrap();
        let mut participant =
            Participant::new(meeting.id, "s-1".to_string(), Some("alice".to_string()));
        participant.id = db.insert_participant(&participant).unwrap();

        let recording = Recording::new(
            meeting.id,
            participant.id,
            audio_path.to_string(),
            "webm".to_string(),
        );
        db.insert_recording(&recording).unwrap();
        recording
    }

    fn local_store_with(path: &str) -> (tempfile::TempDir, Box<dyn AudioStore>) {
        let tmp = tempdir().unwrap();
        let store = LocalAudioStore::new(tmp.path().to_path_buf());
        store.write(path, b"fake-audio").unwrap();
        (tmp, Box::new(store))
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_with_exactly_three_calls() {
        let db = Database::open_memory().unwrap();
        let recording = seed(&db, "recordings/m/take.webm");
        let (_tmp, store) = local_store_with("recordings/m/take.webm");

        let (transcriber, calls) = ScriptedTranscriber::new(vec![
            Err(anyhow::anyhow!("transient 503")),
            Err(anyhow::anyhow!("connection reset")),
            Ok(outcome(vec![utterance(0.0, 2.0, "Hello world.", 0)])),
        ]);
        let engine = TranscriptionEngine::new(Box::new(transcriber), store);

        let ok = engine.process_recording(&db, &recording.id).await.unwrap();
        assert!(ok);
        // Exactly three service calls were made
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let stored = db.get_recording(&recording.id).unwrap().unwrap();
        assert_eq!(stored.state, ProcessingState::Processed);
        assert_eq!(stored.transcription_service.as_deref(), Some("scripted"));
        assert!(stored.processing_completed_at.is_some());

        let segments = db.get_segments(&recording.id).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker_name.as_deref(), Some("Speaker 1"));
        assert_eq!(segments[0].speaker_label.as_deref(), Some("speaker_0"));
    }

    #[tokio::test]
    async fn exhausting_retries_marks_failed() {
        let db = Database::open_memory().unwrap();
        let recording = seed(&db, "recordings/m/take.webm");
        let (_tmp, store) = local_store_with("recordings/m/take.webm");

        let (transcriber, _calls) = ScriptedTranscriber::new(vec![
            Err(anyhow::anyhow!("boom")),
            Err(anyhow::anyhow!("boom")),
            Err(anyhow::anyhow!("boom")),
        ]);
        let engine = TranscriptionEngine::new(Box::new(transcriber), store);

        let ok = engine.process_recording(&db, &recording.id).await.unwrap();
        assert!(!ok);

        let stored = db.get_recording(&recording.id).unwrap().unwrap();
        assert_eq!(stored.state, ProcessingState::Failed);
        assert!(db.get_segments(&recording.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_results_count_against_retry_budget() {
        let db = Database::open_memory().unwrap();
        let recording = seed(&db, "recordings/m/take.webm");
        let (_tmp, store) = local_store_with("recordings/m/take.webm");

        let (transcriber, calls) = ScriptedTranscriber::new(vec![
            Ok(outcome(vec![])),
            Ok(outcome(vec![])),
            Ok(outcome(vec![])),
        ]);
        let engine = TranscriptionEngine::new(Box::new(transcriber), store);

        let ok = engine.process_recording(&db, &recording.id).await.unwrap();
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn processed_recording_is_a_noop() {
        let db = Database::open_memory().unwrap();
        let recording = seed(&db, "recordings/m/take.webm");
        db.update_recording_state(&recording.id, ProcessingState::Processed)
            .unwrap();
        let (_tmp, store) = local_store_with("recordings/m/take.webm");

        let (transcriber, calls) = ScriptedTranscriber::new(vec![]);
        let engine = TranscriptionEngine::new(Box::new(transcriber), store);

        let ok = engine.process_recording(&db, &recording.id).await.unwrap();
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_directory_scan() {
        let db = Database::open_memory().unwrap();
        // Recorded path does not exist; a suffixed upload does
        let recording = seed(&db, "recordings/m/take.webm");
        let (_tmp, store) = local_store_with("recordings/m/take_final.webm");

        let (transcriber, _calls) = ScriptedTranscriber::new(vec![Ok(outcome(vec![
            utterance(0.0, 1.0, "Hi.", 0),
        ]))]);
        let engine = TranscriptionEngine::new(Box::new(transcriber), store);

        let ok = engine.process_recording(&db, &recording.id).await.unwrap();
        assert!(ok);

        let stored = db.get_recording(&recording.id).unwrap().unwrap();
        assert_eq!(stored.audio_path, "recordings/m/take_final.webm");
    }

    #[tokio::test]
    async fn missing_file_without_alternative_fails() {
        let db = Database::open_memory().unwrap();
        let recording = seed(&db, "recordings/m/take.webm");
        let tmp = tempdir().unwrap();
        let store: Box<dyn AudioStore> = Box::new(LocalAudioStore::new(tmp.path().to_path_buf()));

        let (transcriber, _calls) = ScriptedTranscriber::new(vec![]);
        let engine = TranscriptionEngine::new(Box::new(transcriber), store);

        let ok = engine.process_recording(&db, &recording.id).await.unwrap();
        assert!(!ok);
        let stored = db.get_recording(&recording.id).unwrap().unwrap();
        assert_eq!(stored.state, ProcessingState::Failed);
    }

    #[test]
    fn speaker_identification_is_one_based() {
        assert_eq!(identify_speaker(Some("speaker_0")), "Speaker 1");
        assert_eq!(identify_speaker(Some("speaker_3")), "Speaker 4");
        assert_eq!(identify_speaker(None), "Unknown Speaker");
        assert_eq!(identify_speaker(Some("alice")), "alice");
    }
}
