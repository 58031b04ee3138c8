//! Meeting readiness gate
//!
//! A meeting becomes ready for summarization once every one of its
//! recordings has been transcribed successfully; a failed recording
//! holds the meeting back until it is re-queued. The dispatch claim
//! lives in the database,
//! so concurrent workers finishing their last recordings at the same
//! time hand exactly one of them the summary job.

use anyhow::Result;
use tracing::info;

use crate::pipeline::merger::{group_by_speaker, merge_segments, render_transcript};
use crate::storage::Database;

/// Check whether a meeting is ready and, if so, claim the summary job.
///
/// Returns Ok(true) for exactly one caller per meeting: the one that
/// wins the dispatch claim. That caller finds the merged raw transcript
/// already persisted on the summary row.
pub fn check_and_dispatch(db: &Database, meeting_id: i64) -> Result<bool> {
    let counts = db.recording_counts(meeting_id)?;
    if !counts.is_ready() {
        return Ok(false);
    }

    db.ensure_summary(meeting_id)?;
    if !db.claim_summary_dispatch(meeting_id)? {
        // Another worker already took this meeting
        return Ok(false);
    }

    let segments = merge_segments(db.get_processed_segments(meeting_id)?);
    let transcript = render_transcript(&group_by_speaker(&segments));
    db.set_summary_raw_transcript(meeting_id, &transcript)?;

    info!(
        "Meeting {} ready: {} recordings processed, {} segments merged",
        meeting_id,
        counts.processed,
        segments.len()
    );

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Meeting, Participant, ProcessingState, Recording, Segment};

    fn seed_meeting(db: &Database) -> Meeting {
        let mut meeting = Meeting::new("Sync".to_string(), Some("alice".to_string()), 8);
        meeting.id = db.insert_meeting(&meeting).unwrap();
        meeting
    }

    fn add_recording(db: &Database, meeting: &Meeting, state: ProcessingState) -> Recording {
        let mut p = Participant::new(meeting.id, format!("s-{}", uuid::Uuid::new_v4()), None);
        p.id = db.insert_participant(&p).unwrap();

        let mut recording = Recording::new(
            meeting.id,
            p.id,
            format!("recordings/{}.webm", uuid::Uuid::new_v4()),
            "webm".to_string(),
        );
        recording.state = state;
        db.insert_recording(&recording).unwrap();
        recording
    }

    fn add_segment(db: &Database, recording: &Recording, start: f64, text: &str, speaker: &str) {
        let mut s = Segment::new(recording.id.clone(), start, start + 1.0, text.to_string());
        s.speaker_name = Some(speaker.to_string());
        db.insert_segments(&[s]).unwrap();
    }

    #[test]
    fn not_ready_while_recordings_pend() {
        let db = Database::open_memory().unwrap();
        let meeting = seed_meeting(&db);
        add_recording(&db, &meeting, ProcessingState::Processed);
        add_recording(&db, &meeting, ProcessingState::Pending);

        assert!(!check_and_dispatch(&db, meeting.id).unwrap());
        assert!(db.get_summary(meeting.id).unwrap().is_none());
    }

    #[test]
    fn meeting_without_recordings_never_becomes_ready() {
        let db = Database::open_memory().unwrap();
        let meeting = seed_meeting(&db);

        assert!(!check_and_dispatch(&db, meeting.id).unwrap());
    }

    #[test]
    fn failed_recordings_block_readiness() {
        let db = Database::open_memory().unwrap();
        let meeting = seed_meeting(&db);
        add_recording(&db, &meeting, ProcessingState::Processed);
        add_recording(&db, &meeting, ProcessingState::Failed);

        // A failed recording never reaches Processed, so the processed
        // count stays short of the total.
        assert!(!check_and_dispatch(&db, meeting.id).unwrap());
    }

    #[test]
    fn ready_meeting_gets_merged_transcript() {
        let db = Database::open_memory().unwrap();
        let meeting = seed_meeting(&db);
        let rec_a = add_recording(&db, &meeting, ProcessingState::Processed);
        let rec_b = add_recording(&db, &meeting, ProcessingState::Processed);

        add_segment(&db, &rec_a, 0.0, "Let's begin.", "Speaker 1");
        add_segment(&db, &rec_b, 2.0, "One question.", "Speaker 2");
        add_segment(&db, &rec_a, 4.0, "Go ahead.", "Speaker 1");

        assert!(check_and_dispatch(&db, meeting.id).unwrap());

        let summary = db.get_summary(meeting.id).unwrap().unwrap();
        let transcript = summary.raw_transcript;
        let first = transcript.find("Speaker 1: Let's begin.").unwrap();
        let second = transcript.find("Speaker 2: One question.").unwrap();
        let third = transcript.find("Speaker 1: Go ahead.").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn dispatch_is_claimed_at_most_once() {
        let db = Database::open_memory().unwrap();
        let meeting = seed_meeting(&db);
        let recording = add_recording(&db, &meeting, ProcessingState::Processed);
        add_segment(&db, &recording, 0.0, "Hi.", "Speaker 1");

        assert!(check_and_dispatch(&db, meeting.id).unwrap());
        assert!(!check_and_dispatch(&db, meeting.id).unwrap());
    }

    #[test]
    fn concurrent_callers_yield_one_claim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.db");

        let db = Database::open_path(&path).unwrap();
        let meeting = seed_meeting(&db);
        let recording = add_recording(&db, &meeting, ProcessingState::Processed);
        add_segment(&db, &recording, 0.0, "Hi.", "Speaker 1");
        let meeting_id = meeting.id;
        drop(db);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                let db = Database::open_path(&path).unwrap();
                check_and_dispatch(&db, meeting_id).unwrap()
            }));
        }

        let claims = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|claimed| *claimed)
            .count();
        assert_eq!(claims, 1);
    }

    #[test]
    fn segments_from_failed_recordings_are_excluded() {
        let db = Database::open_memory().unwrap();
        let meeting = seed_meeting(&db);
        let good = add_recording(&db, &meeting, ProcessingState::Processed);
        add_segment(&db, &good, 0.0, "Kept.", "Speaker 1");

        assert!(check_and_dispatch(&db, meeting.id).unwrap());
        let summary = db.get_summary(meeting.id).unwrap().unwrap();
        assert!(summary.raw_transcript.contains("Kept."));
    }
}
