//! Synchronous service boundary
//!
//! The operations external callers invoke against the pipeline: create
//! and join meetings, upload recordings, query status. Errors are
//! classified so callers can tell a bad request from a broken server.

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::coordination::score_and_store;
use crate::coordination::RecordingPolicy;
use crate::storage::{
    AgendaItem, AudioStore, Database, Meeting, MeetingState, Participant, QualityMetric, Recording,
    RecordingCounts,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Whether the caller, not the server, is at fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Create a new meeting in the Scheduled state.
pub fn create_meeting(
    db: &Database,
    title: &str,
    host: Option<&str>,
    code_length: usize,
) -> ServiceResult<Meeting> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "Meeting title must not be empty".to_string(),
        ));
    }

    let mut meeting = Meeting::new(
        title.to_string(),
        host.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()),
        code_length,
    );
    meeting.id = db.insert_meeting(&meeting)?;

    info!("Created meeting {} ({})", meeting.code, meeting.title);
    Ok(meeting)
}

/// Join a meeting, activating it on the first join.
///
/// Joining again with the same session id returns the existing
/// participant.
pub fn join_meeting(
    db: &Database,
    code: &str,
    session_id: &str,
    user: Option<&str>,
) -> ServiceResult<Participant> {
    let meeting = resolve_meeting(db, code)?;
    if meeting.state == MeetingState::Completed {
        return Err(ServiceError::InvalidRequest(format!(
            "Meeting {} has ended",
            meeting.code
        )));
    }

    if let Some(existing) = db.get_participant(meeting.id, session_id)? {
        return Ok(existing);
    }

    let mut participant = Participant::new(
        meeting.id,
        session_id.to_string(),
        user.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
    );
    participant.id = db.insert_participant(&participant)?;

    activate_if_scheduled(db, meeting)?;

    Ok(participant)
}

/// Flag a participant as recording (or not).
pub fn set_recording(
    db: &Database,
    code: &str,
    session_id: &str,
    is_recording: bool,
) -> ServiceResult<Participant> {
    let meeting = resolve_meeting(db, code)?;
    let mut participant = resolve_participant(db, &meeting, session_id)?;

    participant.is_recording = is_recording;
    db.update_participant(&participant)?;

    Ok(participant)
}

/// Append an agenda item to a meeting.
pub fn add_agenda_item(
    db: &Database,
    code: &str,
    title: &str,
    owner: Option<&str>,
) -> ServiceResult<AgendaItem> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "Agenda item title must not be empty".to_string(),
        ));
    }

    let meeting = resolve_meeting(db, code)?;
    let position = db.list_agenda_items(meeting.id)?.len() as i64 + 1;

    let mut item = AgendaItem {
        id: 0,
        meeting_id: meeting.id,
        position,
        title: title.to_string(),
        owner: owner.map(|o| o.trim().to_string()).filter(|o| !o.is_empty()),
    };
    item.id = db.insert_agenda_item(&item)?;

    Ok(item)
}

/// End a meeting on host action. Ending an already completed meeting is
/// a no-op.
pub fn end_meeting(db: &Database, code: &str) -> ServiceResult<Meeting> {
    let mut meeting = resolve_meeting(db, code)?;
    if meeting.state == MeetingState::Completed {
        return Ok(meeting);
    }

    meeting.state = MeetingState::Completed;
    if meeting.ended_at.is_none() {
        meeting.ended_at = Some(Utc::now());
    }
    db.update_meeting(&meeting)?;

    info!("Meeting {} ended", meeting.code);
    Ok(meeting)
}

/// One audio upload from a participant's device
pub struct UploadRequest {
    pub meeting: String,
    pub session_id: String,
    pub filename: String,
    pub audio: Vec<u8>,
}

#[derive(Debug)]
pub struct UploadResponse {
    pub recording_id: String,
    pub audio_path: String,
}

/// Accept one audio upload and queue it for transcription.
///
/// Under the admin-only policy, uploads from anyone but the host are
/// rejected.
pub fn upload_recording(
    db: &Database,
    store: &dyn AudioStore,
    policy: RecordingPolicy,
    request: UploadRequest,
) -> ServiceResult<UploadResponse> {
    if request.audio.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "Audio payload is empty".to_string(),
        ));
    }
    let filename = sanitize_filename(&request.filename)?;

    let meeting = resolve_meeting(db, &request.meeting)?;
    if meeting.state == MeetingState::Completed {
        return Err(ServiceError::InvalidRequest(format!(
            "Meeting {} has ended",
            meeting.code
        )));
    }

    let mut participant = resolve_participant(db, &meeting, &request.session_id)?;

    if policy == RecordingPolicy::AdminOnly
        && (participant.user.is_none() || participant.user != meeting.host)
    {
        return Err(ServiceError::Forbidden(
            "Only the meeting host may record under the current policy".to_string(),
        ));
    }

    let owner = participant.user.as_deref().unwrap_or("anonymous");
    let audio_path = format!(
        "recordings/user_{}/meeting_{}/{}",
        owner, meeting.code, filename
    );
    store.write(&audio_path, &request.audio)?;

    if !participant.is_recording {
        participant.is_recording = true;
        db.update_participant(&participant)?;
    }

    let mut recording = Recording::new(
        meeting.id,
        participant.id,
        audio_path.clone(),
        file_format(&filename),
    );
    recording.file_size = Some(request.audio.len() as u64);
    db.insert_recording(&recording)?;

    activate_if_scheduled(db, meeting)?;

    info!(
        "Recording {} uploaded ({} bytes) for meeting {}",
        recording.id,
        request.audio.len(),
        request.meeting
    );

    Ok(UploadResponse {
        recording_id: recording.id,
        audio_path,
    })
}

/// Read-only view of a meeting's recording progress
pub struct MeetingStatus {
    pub meeting: Meeting,
    pub counts: RecordingCounts,
    pub is_ready: bool,
    pub participants: Vec<ParticipantStatus>,
}

pub struct ParticipantStatus {
    pub session_id: String,
    pub user: Option<String>,
    pub is_recording: bool,
    pub audio_quality_score: Option<f64>,
}

/// Query current meeting state. No side effects.
pub fn meeting_status(db: &Database, code: &str) -> ServiceResult<MeetingStatus> {
    let meeting = resolve_meeting(db, code)?;
    let counts = db.recording_counts(meeting.id)?;

    let participants = db
        .list_participants(meeting.id)?
        .into_iter()
        .map(|p| ParticipantStatus {
            session_id: p.session_id,
            user: p.user,
            is_recording: p.is_recording,
            audio_quality_score: p.audio_quality_score,
        })
        .collect();

    Ok(MeetingStatus {
        is_ready: counts.is_ready(),
        meeting,
        counts,
        participants,
    })
}

/// Record one quality reading for a participant and refresh their
/// overall score.
pub fn record_quality_metric(
    db: &Database,
    code: &str,
    session_id: &str,
    volume: Option<f64>,
    noise: Option<f64>,
    clarity: Option<f64>,
    proximity: Option<f64>,
) -> ServiceResult<QualityMetric> {
    for reading in [volume, noise, clarity, proximity].into_iter().flatten() {
        if !(0.0..=1.0).contains(&reading) {
            return Err(ServiceError::InvalidRequest(
                "Quality readings must be between 0.0 and 1.0".to_string(),
            ));
        }
    }

    let meeting = resolve_meeting(db, code)?;
    let mut participant = resolve_participant(db, &meeting, session_id)?;

    let mut metric = QualityMetric::new(participant.id);
    metric.volume_level = volume;
    metric.background_noise = noise;
    metric.clarity_score = clarity;
    metric.proximity_score = proximity;
    metric.id = db.insert_quality_metric(&metric)?;

    let score = score_and_store(db, &mut metric)?;
    participant.audio_quality_score = Some(score);
    db.update_participant(&participant)?;

    Ok(metric)
}

fn resolve_meeting(db: &Database, code: &str) -> ServiceResult<Meeting> {
    db.get_meeting(code)?
        .ok_or_else(|| ServiceError::NotFound(format!("Meeting {} not found", code)))
}

fn resolve_participant(
    db: &Database,
    meeting: &Meeting,
    session_id: &str,
) -> ServiceResult<Participant> {
    db.get_participant(meeting.id, session_id)?.ok_or_else(|| {
        ServiceError::NotFound(format!(
            "Session {} has not joined meeting {}",
            session_id, meeting.code
        ))
    })
}

fn activate_if_scheduled(db: &Database, mut meeting: Meeting) -> Result<()> {
    if meeting.state != MeetingState::Scheduled {
        return Ok(());
    }

    meeting.state = MeetingState::Active;
    meeting.started_at = Some(Utc::now());
    db.update_meeting(&meeting)?;
    Ok(())
}

fn sanitize_filename(filename: &str) -> ServiceResult<String> {
    let filename = filename.trim();
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(ServiceError::InvalidRequest(format!(
            "Invalid upload filename: {:?}",
            filename
        )));
    }
    Ok(filename.to_string())
}

fn file_format(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "webm".to_string())
}
