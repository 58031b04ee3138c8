//! End-to-end pipeline tests: segments in, structured minutes out.

use anyhow::Result;
use async_trait::async_trait;
use tempfile::tempdir;

use huddle::llm::{ChatModel, ChatRequest};
use huddle::pipeline::{check_and_dispatch, SummaryGenerator};
use huddle::storage::{
    Database, Meeting, MeetingState, Participant, ProcessingState, Recording, Segment,
};

/// Chat stub: echoes the cleanup input back, answers analysis with a
/// fixed JSON document.
struct CannedChat;

#[async_trait]
impl ChatModel for CannedChat {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<String> {
        if request.model == "cleanup-model" {
            Ok("Speaker 1: Hello. Speaker 2: Hi.".to_string())
        } else {
            Ok(serde_json::json!({
                "executive_summary": "Two people greeted each other.",
                "key_points": ["Greetings exchanged"],
                "action_items": [],
                "decisions_made": [],
                "participants_summary": {"speakers": 2}
            })
            .to_string())
        }
    }
}

fn seed_active_meeting(db: &Database) -> Result<Meeting> {
    let mut meeting = Meeting::new("Pipeline test".to_string(), Some("alice".to_string()), 8);
    meeting.state = MeetingState::Active;
    meeting.id = db.insert_meeting(&meeting)?;
    Ok(meeting)
}

fn seed_processed_recording(
    db: &Database,
    meeting: &Meeting,
    session: &str,
    segments: &[(f64, &str, &str)],
) -> Result<()> {
    let mut participant = Participant::new(meeting.id, session.to_string(), None);
    participant.id = db.insert_participant(&participant)?;

    let mut recording = Recording::new(
        meeting.id,
        participant.id,
        format!("recordings/{}.webm", session),
        "webm".to_string(),
    );
    recording.state = ProcessingState::Processed;
    db.insert_recording(&recording)?;

    let rows: Vec<Segment> = segments
        .iter()
        .map(|(start, text, speaker)| {
            let mut s = Segment::new(recording.id.clone(), *start, start + 1.0, text.to_string());
            s.speaker_name = Some(speaker.to_string());
            s
        })
        .collect();
    db.insert_segments(&rows)?;
    Ok(())
}

#[tokio::test]
async fn ready_meeting_flows_through_to_minutes() -> Result<()> {
    let tmp = tempdir()?;
    let db = Database::open_path(&tmp.path().join("huddle.db"))?;
    let meeting = seed_active_meeting(&db)?;

    seed_processed_recording(
        &db,
        &meeting,
        "s-1",
        &[(0.0, "Hello there.", "Speaker 1"), (4.0, "Moving on.", "Speaker 1")],
    )?;
    seed_processed_recording(&db, &meeting, "s-2", &[(2.0, "Hi.", "Speaker 2")])?;

    // Gate claims exactly once and persists the merged transcript
    assert!(check_and_dispatch(&db, meeting.id)?);
    assert!(!check_and_dispatch(&db, meeting.id)?);

    let summary = db.get_summary(meeting.id)?.expect("summary row");
    let raw = &summary.raw_transcript;
    let first = raw.find("Speaker 1: Hello there.").expect("first turn");
    let second = raw.find("Speaker 2: Hi.").expect("second turn");
    let third = raw.find("Speaker 1: Moving on.").expect("third turn");
    assert!(first < second && second < third);

    let generator = SummaryGenerator::new(
        Box::new(CannedChat),
        "cleanup-model".to_string(),
        "analysis-model".to_string(),
    );
    assert!(generator.process_meeting(&db, meeting.id).await?);

    let summary = db.get_summary(meeting.id)?.expect("summary row");
    assert!(summary.is_ai_processed);
    assert_eq!(summary.clean_transcript, "Speaker 1: Hello. Speaker 2: Hi.");
    assert_eq!(summary.executive_summary, "Two people greeted each other.");
    assert_eq!(summary.key_points, vec!["Greetings exchanged"]);

    // Summarization autonomously closed the meeting
    let meeting = db.get_meeting_by_id(meeting.id)?.expect("meeting");
    assert_eq!(meeting.state, MeetingState::Completed);

    Ok(())
}

#[tokio::test]
async fn gate_waits_for_the_last_recording() -> Result<()> {
    let tmp = tempdir()?;
    let db = Database::open_path(&tmp.path().join("huddle.db"))?;
    let meeting = seed_active_meeting(&db)?;

    seed_processed_recording(&db, &meeting, "s-1", &[(0.0, "Hello.", "Speaker 1")])?;

    let mut participant = Participant::new(meeting.id, "s-2".to_string(), None);
    participant.id = db.insert_participant(&participant)?;
    let pending = Recording::new(
        meeting.id,
        participant.id,
        "recordings/s-2.webm".to_string(),
        "webm".to_string(),
    );
    db.insert_recording(&pending)?;

    assert!(!check_and_dispatch(&db, meeting.id)?);

    db.update_recording_state(&pending.id, ProcessingState::Processed)?;
    assert!(check_and_dispatch(&db, meeting.id)?);

    Ok(())
}
