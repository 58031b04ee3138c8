//! Pipeline task entry points
//!
//! Every task opens its own database connection and swallows its own
//! errors, so one broken recording never takes the worker loop down.
//! The readiness gate runs after every transcription attempt, including
//! failed ones, because a failure can still be the last outstanding
//! recording of its meeting.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::email::{build_mailer, summary_ready_message};
use crate::pipeline::readiness::check_and_dispatch;
use crate::pipeline::summary::SummaryGenerator;
use crate::storage::{Database, ProcessingState};
use crate::transcription::TranscriptionEngine;

const WORKER_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// Transcribe one recording, then check whether its meeting became ready.
///
/// Returns true when the recording reached Processed.
pub async fn run_transcription_task(settings: &Settings, recording_id: &str) -> bool {
    let db = match Database::open(settings) {
        Ok(db) => db,
        Err(e) => {
            error!("Database error in transcription task: {}", e);
            return false;
        }
    };

    let meeting_id = match db.get_recording(recording_id) {
        Ok(Some(recording)) => recording.meeting_id,
        Ok(None) => {
            error!("Recording {} not found", recording_id);
            return false;
        }
        Err(e) => {
            error!("Database error in transcription task: {}", e);
            return false;
        }
    };

    let engine = match TranscriptionEngine::from_settings(settings) {
        Ok(engine) => engine,
        Err(e) => {
            // Leave the recording pending for a configured worker
            error!("Cannot start transcription: {}", e);
            return false;
        }
    };

    let succeeded = match engine.process_recording(&db, recording_id).await {
        Ok(succeeded) => succeeded,
        Err(e) => {
            error!("Transcription task failed for {}: {}", recording_id, e);
            if let Err(e) = db.update_recording_state(recording_id, ProcessingState::Failed) {
                error!("Failed to update recording state: {}", e);
            }
            false
        }
    };

    match check_and_dispatch(&db, meeting_id) {
        Ok(true) => {
            run_analysis_task(settings, meeting_id).await;
        }
        Ok(false) => {}
        Err(e) => error!("Readiness check failed for meeting {}: {}", meeting_id, e),
    }

    succeeded
}

/// Generate the AI summary for a ready meeting and notify the host.
///
/// Returns true when the summary ends up AI-processed.
pub async fn run_analysis_task(settings: &Settings, meeting_id: i64) -> bool {
    let db = match Database::open(settings) {
        Ok(db) => db,
        Err(e) => {
            error!("Database error in analysis task: {}", e);
            return false;
        }
    };

    let generator = match SummaryGenerator::from_settings(settings) {
        Ok(generator) => generator,
        Err(e) => {
            error!("Cannot start AI processing: {}", e);
            return false;
        }
    };

    match generator.process_meeting(&db, meeting_id).await {
        Ok(true) => {
            notify_host(settings, &db, meeting_id).await;
            true
        }
        Ok(false) => false,
        Err(e) => {
            error!("AI processing failed for meeting {}: {}", meeting_id, e);
            false
        }
    }
}

/// Best-effort summary notification. Hosts identified by an email
/// address get one; nothing here can fail the pipeline.
async fn notify_host(settings: &Settings, db: &Database, meeting_id: i64) {
    let (meeting, summary) = match (db.get_meeting_by_id(meeting_id), db.get_summary(meeting_id)) {
        (Ok(Some(meeting)), Ok(Some(summary))) => (meeting, summary),
        _ => return,
    };

    let Some(host) = meeting.host.clone().filter(|h| h.contains('@')) else {
        debug!("Meeting {} host has no email address, skipping notification", meeting.code);
        return;
    };

    let mailer = match build_mailer(settings) {
        Ok(mailer) => mailer,
        Err(e) => {
            debug!("Email not configured, skipping notification: {}", e);
            return;
        }
    };

    let report = mailer
        .send(&summary_ready_message(&meeting, &summary, &host))
        .await;
    info!("Summary notification for {}: {}", meeting.code, report.message);
}

/// Process everything currently pending, once.
///
/// Returns the number of recordings that reached Processed.
pub async fn process_pending(settings: &Settings) -> Result<usize> {
    let pending = {
        let db = Database::open(settings)?;
        db.get_pending_recordings()?
    };

    let mut processed = 0;
    for recording in pending {
        info!("Picking up pending recording {}", recording.id);
        if run_transcription_task(settings, &recording.id).await {
            processed += 1;
        }
    }

    Ok(processed)
}

/// Background worker that drains the pending queue on a fixed interval.
pub async fn run_worker(settings: &Settings) -> Result<()> {
    info!("Starting processing worker");

    loop {
        match process_pending(settings).await {
            Ok(0) => {}
            Ok(n) => info!("Worker pass processed {} recording(s)", n),
            Err(e) => error!("Worker pass failed: {}", e),
        }
        tokio::time::sleep(WORKER_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.general.data_dir = dir.to_path_buf();
        settings
    }

    #[tokio::test]
    async fn empty_queue_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = temp_settings(dir.path());
        settings.ensure_dirs().unwrap();

        assert_eq!(process_pending(&settings).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_recording_is_reported_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let settings = temp_settings(dir.path());
        settings.ensure_dirs().unwrap();
        Database::open(&settings).unwrap();

        assert!(!run_transcription_task(&settings, "no-such-id").await);
    }
}
