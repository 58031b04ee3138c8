//! Data models for storage

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingState {
    /// Created but nobody has joined yet
    Scheduled,
    /// At least one participant joined or recorded
    Active,
    /// Ended by the host, or closed automatically after summarization
    Completed,
}

impl MeetingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A meeting identified by a short join code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    /// Database row id
    pub id: i64,

    /// Opaque short join code (lowercase alphanumeric)
    pub code: String,

    /// Meeting title
    pub title: String,

    /// Host user identity, if any
    pub host: Option<String>,

    /// Current lifecycle state
    pub state: MeetingState,

    /// When the first participant joined
    pub started_at: Option<DateTime<Utc>>,

    /// When the meeting ended
    pub ended_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Create a new scheduled meeting with a random join code
    pub fn new(title: String, host: Option<String>, code_length: usize) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            code: generate_meeting_code(code_length),
            title,
            host,
            state: MeetingState::Scheduled,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Generate a random lowercase alphanumeric meeting join code
pub fn generate_meeting_code(length: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// A participant session within one meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Database row id
    pub id: i64,

    /// Meeting this participant belongs to
    pub meeting_id: i64,

    /// Linked user identity if authenticated
    pub user: Option<String>,

    /// Session identity, unique within the meeting
    pub session_id: String,

    /// Whether this participant's device is capturing audio
    pub is_recording: bool,

    /// Latest overall audio quality score
    pub audio_quality_score: Option<f64>,

    /// When the participant joined
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(meeting_id: i64, session_id: String, user: Option<String>) -> Self {
        Self {
            id: 0,
            meeting_id,
            user,
            session_id,
            is_recording: false,
            audio_quality_score: None,
            joined_at: Utc::now(),
        }
    }
}

/// Processing state of an uploaded recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    /// Uploaded, waiting for transcription
    Pending,
    /// Transcription in progress
    Processing,
    /// Transcription complete; segments are final
    Processed,
    /// Transcription failed after exhausting retries
    Failed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One uploaded audio recording belonging to a meeting participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Unique identifier (UUID)
    pub id: String,

    /// Owning meeting
    pub meeting_id: i64,

    /// Uploading participant
    pub participant_id: i64,

    /// Path of the audio payload within the blob store
    pub audio_path: String,

    /// Payload size in bytes
    pub file_size: Option<u64>,

    /// Audio container format (webm, ogg, wav, ...)
    pub format: String,

    /// Current processing state
    pub state: ProcessingState,

    /// When transcription started
    pub processing_started_at: Option<DateTime<Utc>>,

    /// When transcription completed
    pub processing_completed_at: Option<DateTime<Utc>>,

    /// Service used for transcription
    pub transcription_service: Option<String>,

    /// Request id reported by the transcription service
    pub service_request_id: Option<String>,

    /// Raw service response, persisted verbatim for audit
    pub transcription_raw: Option<serde_json::Value>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    pub fn new(meeting_id: i64, participant_id: i64, audio_path: String, format: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            meeting_id,
            participant_id,
            audio_path,
            file_size: None,
            format,
            state: ProcessingState::Pending,
            processing_started_at: None,
            processing_completed_at: None,
            transcription_service: None,
            service_request_id: None,
            transcription_raw: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A diarized span of transcribed speech
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Unique identifier
    pub id: i64,

    /// Recording this segment belongs to
    pub recording_id: String,

    /// Start time in seconds from beginning of recording
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,

    /// Transcribed text
    pub text: String,

    /// Confidence score (0.0 - 1.0)
    pub confidence: Option<f64>,

    /// Raw speaker label from diarization (e.g. "speaker_0")
    pub speaker_label: Option<String>,

    /// Resolved display name (e.g. "Speaker 1")
    pub speaker_name: Option<String>,

    /// Agenda item active when this segment was recorded
    pub agenda_item_id: Option<i64>,
}

impl Segment {
    /// Create a new segment
    pub fn new(recording_id: String, start_time: f64, end_time: f64, text: String) -> Self {
        Self {
            id: 0, // Will be set by database
            recording_id,
            start_time,
            end_time,
            text,
            confidence: None,
            speaker_label: None,
            speaker_name: None,
            agenda_item_id: None,
        }
    }
}

/// One action item extracted from a meeting analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionItem {
    #[serde(default)]
    pub task: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub due_date: Option<String>,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub agenda_item: Option<String>,
}

/// AI-generated meeting summary and insights, one per meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Database row id
    pub id: i64,

    /// Owning meeting
    pub meeting_id: i64,

    /// Original verbatim transcript merged from all recordings
    pub raw_transcript: String,

    /// AI-cleaned and formatted transcript
    pub clean_transcript: String,

    /// High-level meeting summary
    pub executive_summary: String,

    /// Key discussion points
    pub key_points: Vec<String>,

    /// Action items with owners and due dates
    pub action_items: Vec<ActionItem>,

    /// Decisions reached during the meeting
    pub decisions_made: Vec<String>,

    /// Speaking time and participation stats
    pub participants_summary: serde_json::Value,

    /// Whether AI cleanup and analysis is complete
    pub is_ai_processed: bool,

    /// When AI processing started
    pub ai_processing_started_at: Option<DateTime<Utc>>,

    /// When AI processing completed
    pub ai_processing_completed_at: Option<DateTime<Utc>>,
}

impl Summary {
    /// Clean transcript if available, else the raw transcript
    pub fn full_transcript(&self) -> &str {
        if self.clean_transcript.is_empty() {
            &self.raw_transcript
        } else {
            &self.clean_transcript
        }
    }
}

/// One audio quality reading for a participant (append-only series)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetric {
    /// Database row id
    pub id: i64,

    /// Participant this reading belongs to
    pub participant_id: i64,

    /// Input volume level (0.0 - 1.0)
    pub volume_level: Option<f64>,

    /// Background noise level (0.0 - 1.0, lower is better)
    pub background_noise: Option<f64>,

    /// Speech clarity score (0.0 - 1.0)
    pub clarity_score: Option<f64>,

    /// Microphone proximity score (0.0 - 1.0)
    pub proximity_score: Option<f64>,

    /// Derived weighted overall score
    pub overall_score: Option<f64>,

    /// Reading timestamp
    pub created_at: DateTime<Utc>,
}

impl QualityMetric {
    pub fn new(participant_id: i64) -> Self {
        Self {
            id: 0,
            participant_id,
            volume_level: None,
            background_noise: None,
            clarity_score: None,
            proximity_score: None,
            overall_score: None,
            created_at: Utc::now(),
        }
    }
}

/// Audit record of a recorder selection run (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationDecision {
    /// Database row id
    pub id: i64,

    /// Meeting the decision was made for
    pub meeting_id: i64,

    /// Selected primary recorder
    pub primary_recorder_id: i64,

    /// Backup recorders, in selection order
    pub backup_recorder_ids: Vec<i64>,

    /// Version of the selection algorithm used
    pub algorithm_version: String,

    /// Factors considered when making the decision
    pub decision_factors: serde_json::Value,

    /// Decision timestamp
    pub created_at: DateTime<Utc>,
}

/// One agenda item of a meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaItem {
    /// Database row id
    pub id: i64,

    /// Owning meeting
    pub meeting_id: i64,

    /// Order within the agenda
    pub position: i64,

    /// Item title
    pub title: String,

    /// Participant responsible for the item, if assigned
    pub owner: Option<String>,
}
