//! SQLite database management for the meeting pipeline

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use crate::config::Settings;
use crate::storage::models::{
    AgendaItem, CoordinationDecision, Meeting, MeetingState, Participant, ProcessingState,
    QualityMetric, Recording, Segment, Summary,
};

/// Database wrapper for huddle
pub struct Database {
    conn: Connection,
}

const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Recording completion counts for one meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingCounts {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

impl RecordingCounts {
    /// All recordings finished transcription successfully and at least one exists
    pub fn is_ready(&self) -> bool {
        self.total > 0 && self.processed == self.total
    }
}

impl Database {
    /// Open or create the database
    pub fn open(settings: &Settings) -> Result<Self> {
        let db_path = settings.database_path();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::open_path(&db_path)
    }

    /// Open database at a specific path (useful for testing)
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        // Enable foreign keys; tasks each hold their own connection,
        // so waiting on a writer must not error out immediately.
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.busy_timeout(Duration::from_secs(5))?;

        let current_version = self.schema_version()?;
        if current_version > CURRENT_SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is newer than supported version {}",
                current_version,
                CURRENT_SCHEMA_VERSION
            );
        }

        if current_version < 1 {
            self.migrate_to_v1()?;
            self.set_schema_version(1)?;
        }

        Ok(())
    }

    /// Current schema version tracked in PRAGMA user_version.
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?)
    }

    fn set_schema_version(&self, version: i64) -> Result<()> {
        self.conn
            .execute(&format!("PRAGMA user_version = {}", version), [])?;
        Ok(())
    }

    fn migrate_to_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meetings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                host TEXT,
                state TEXT NOT NULL DEFAULT 'scheduled',
                started_at INTEGER,
                ended_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS participants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                meeting_id INTEGER NOT NULL,
                user TEXT,
                session_id TEXT NOT NULL,
                is_recording INTEGER NOT NULL DEFAULT 0,
                audio_quality_score REAL,
                joined_at INTEGER NOT NULL,
                FOREIGN KEY (meeting_id) REFERENCES meetings(id) ON DELETE CASCADE,
                UNIQUE (meeting_id, session_id)
            );

            CREATE TABLE IF NOT EXISTS agenda_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                meeting_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                owner TEXT,
                FOREIGN KEY (meeting_id) REFERENCES meetings(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS recordings (
                id TEXT PRIMARY KEY,
                meeting_id INTEGER NOT NULL,
                participant_id INTEGER NOT NULL,
                audio_path TEXT NOT NULL,
                file_size INTEGER,
                format TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'pending',
                processing_started_at INTEGER,
                processing_completed_at INTEGER,
                transcription_service TEXT,
                service_request_id TEXT,
                transcription_raw TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (meeting_id) REFERENCES meetings(id) ON DELETE CASCADE,
                FOREIGN KEY (participant_id) REFERENCES participants(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_recordings_meeting
                ON recordings(meeting_id);
            CREATE INDEX IF NOT EXISTS idx_recordings_state
                ON recordings(state);

            CREATE TABLE IF NOT EXISTS segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recording_id TEXT NOT NULL,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                text TEXT NOT NULL,
                confidence REAL,
                speaker_label TEXT,
                speaker_name TEXT,
                agenda_item_id INTEGER,
                FOREIGN KEY (recording_id) REFERENCES recordings(id) ON DELETE CASCADE,
                FOREIGN KEY (agenda_item_id) REFERENCES agenda_items(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_segments_recording_id
                ON segments(recording_id);
            CREATE INDEX IF NOT EXISTS idx_segments_start_time
                ON segments(recording_id, start_time);

            CREATE TABLE IF NOT EXISTS summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                meeting_id INTEGER NOT NULL UNIQUE,
                raw_transcript TEXT NOT NULL DEFAULT '',
                clean_transcript TEXT NOT NULL DEFAULT '',
                executive_summary TEXT NOT NULL DEFAULT '',
                key_points TEXT NOT NULL DEFAULT '[]',
                action_items TEXT NOT NULL DEFAULT '[]',
                decisions_made TEXT NOT NULL DEFAULT '[]',
                participants_summary TEXT NOT NULL DEFAULT '{}',
                ai_dispatched INTEGER NOT NULL DEFAULT 0,
                is_ai_processed INTEGER NOT NULL DEFAULT 0,
                ai_processing_started_at INTEGER,
                ai_processing_completed_at INTEGER,
                FOREIGN KEY (meeting_id) REFERENCES meetings(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS quality_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                participant_id INTEGER NOT NULL,
                volume_level REAL,
                background_noise REAL,
                clarity_score REAL,
                proximity_score REAL,
                overall_score REAL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (participant_id) REFERENCES participants(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_quality_metrics_participant
                ON quality_metrics(participant_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS coordination_decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                meeting_id INTEGER NOT NULL,
                primary_recorder_id INTEGER NOT NULL,
                backup_recorder_ids TEXT NOT NULL DEFAULT '[]',
                algorithm_version TEXT NOT NULL,
                decision_factors TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                FOREIGN KEY (meeting_id) REFERENCES meetings(id) ON DELETE CASCADE,
                FOREIGN KEY (primary_recorder_id) REFERENCES participants(id) ON DELETE CASCADE
            );
            "#,
        )?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Meetings
    // ------------------------------------------------------------------

    /// Insert a new meeting and return its row id
    pub fn insert_meeting(&self, meeting: &Meeting) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO meetings (code, title, host, state, started_at, ended_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                meeting.code,
                meeting.title,
                meeting.host,
                meeting.state.as_str(),
                meeting.started_at.map(|t| t.timestamp()),
                meeting.ended_at.map(|t| t.timestamp()),
                meeting.created_at.timestamp(),
                meeting.updated_at.timestamp(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Update a meeting
    pub fn update_meeting(&self, meeting: &Meeting) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE meetings
            SET title = ?2, host = ?3, state = ?4, started_at = ?5, ended_at = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                meeting.id,
                meeting.title,
                meeting.host,
                meeting.state.as_str(),
                meeting.started_at.map(|t| t.timestamp()),
                meeting.ended_at.map(|t| t.timestamp()),
                Utc::now().timestamp(),
            ],
        )?;

        Ok(())
    }

    /// Get a meeting by its join code
    pub fn get_meeting(&self, code: &str) -> Result<Option<Meeting>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, code, title, host, state, started_at, ended_at, created_at, updated_at
                 FROM meetings WHERE code = ?1",
                params![code],
                row_to_meeting,
            )
            .optional()?;

        Ok(result)
    }

    /// Get a meeting by its row id
    pub fn get_meeting_by_id(&self, id: i64) -> Result<Option<Meeting>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, code, title, host, state, started_at, ended_at, created_at, updated_at
                 FROM meetings WHERE id = ?1",
                params![id],
                row_to_meeting,
            )
            .optional()?;

        Ok(result)
    }

    /// Delete a meeting and everything it owns (cascade)
    pub fn delete_meeting(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM meetings WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    /// Insert a new participant and return its row id
    pub fn insert_participant(&self, participant: &Participant) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO participants (meeting_id, user, session_id, is_recording, audio_quality_score, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                participant.meeting_id,
                participant.user,
                participant.session_id,
                participant.is_recording,
                participant.audio_quality_score,
                participant.joined_at.timestamp(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Update a participant's mutable fields
    pub fn update_participant(&self, participant: &Participant) -> Result<()> {
        self.conn.execute(
            "UPDATE participants SET user = ?2, is_recording = ?3, audio_quality_score = ?4 WHERE id = ?1",
            params![
                participant.id,
                participant.user,
                participant.is_recording,
                participant.audio_quality_score,
            ],
        )?;
        Ok(())
    }

    /// Find a participant by meeting and session id
    pub fn get_participant(&self, meeting_id: i64, session_id: &str) -> Result<Option<Participant>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, meeting_id, user, session_id, is_recording, audio_quality_score, joined_at
                 FROM participants WHERE meeting_id = ?1 AND session_id = ?2",
                params![meeting_id, session_id],
                row_to_participant,
            )
            .optional()?;

        Ok(result)
    }

    /// List a meeting's participants in join order
    pub fn list_participants(&self, meeting_id: i64) -> Result<Vec<Participant>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meeting_id, user, session_id, is_recording, audio_quality_score, joined_at
             FROM participants
             WHERE meeting_id = ?1
             ORDER BY joined_at ASC, id ASC",
        )?;

        let participants = stmt
            .query_map(params![meeting_id], row_to_participant)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(participants)
    }

    // ------------------------------------------------------------------
    // Agenda items
    // ------------------------------------------------------------------

    /// Insert an agenda item and return its row id
    pub fn insert_agenda_item(&self, item: &AgendaItem) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO agenda_items (meeting_id, position, title, owner) VALUES (?1, ?2, ?3, ?4)",
            params![item.meeting_id, item.position, item.title, item.owner],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List a meeting's agenda items in order
    pub fn list_agenda_items(&self, meeting_id: i64) -> Result<Vec<AgendaItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meeting_id, position, title, owner
             FROM agenda_items WHERE meeting_id = ?1 ORDER BY position ASC",
        )?;

        let items = stmt
            .query_map(params![meeting_id], |row| {
                Ok(AgendaItem {
                    id: row.get(0)?,
                    meeting_id: row.get(1)?,
                    position: row.get(2)?,
                    title: row.get(3)?,
                    owner: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    // ------------------------------------------------------------------
    // Recordings
    // ------------------------------------------------------------------

    /// Insert a new recording
    pub fn insert_recording(&self, recording: &Recording) -> Result<()> {
        let raw_json = match &recording.transcription_raw {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        self.conn.execute(
            r#"
            INSERT INTO recordings (
                id, meeting_id, participant_id, audio_path, file_size, format, state,
                processing_started_at, processing_completed_at,
                transcription_service, service_request_id, transcription_raw,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                recording.id,
                recording.meeting_id,
                recording.participant_id,
                recording.audio_path,
                recording.file_size,
                recording.format,
                recording.state.as_str(),
                recording.processing_started_at.map(|t| t.timestamp()),
                recording.processing_completed_at.map(|t| t.timestamp()),
                recording.transcription_service,
                recording.service_request_id,
                raw_json,
                recording.created_at.timestamp(),
                recording.updated_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    /// Update a recording
    pub fn update_recording(&self, recording: &Recording) -> Result<()> {
        let raw_json = match &recording.transcription_raw {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        self.conn.execute(
            r#"
            UPDATE recordings
            SET audio_path = ?2, file_size = ?3, format = ?4, state = ?5,
                processing_started_at = ?6, processing_completed_at = ?7,
                transcription_service = ?8, service_request_id = ?9, transcription_raw = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
            params![
                recording.id,
                recording.audio_path,
                recording.file_size,
                recording.format,
                recording.state.as_str(),
                recording.processing_started_at.map(|t| t.timestamp()),
                recording.processing_completed_at.map(|t| t.timestamp()),
                recording.transcription_service,
                recording.service_request_id,
                raw_json,
                Utc::now().timestamp(),
            ],
        )?;

        Ok(())
    }

    /// Get a recording by ID
    pub fn get_recording(&self, id: &str) -> Result<Option<Recording>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, meeting_id, participant_id, audio_path, file_size, format, state,
                        processing_started_at, processing_completed_at,
                        transcription_service, service_request_id, transcription_raw,
                        created_at, updated_at
                 FROM recordings WHERE id = ?1",
                params![id],
                row_to_recording,
            )
            .optional()?;

        Ok(result)
    }

    /// List a meeting's recordings in upload order
    pub fn list_recordings(&self, meeting_id: i64) -> Result<Vec<Recording>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meeting_id, participant_id, audio_path, file_size, format, state,
                    processing_started_at, processing_completed_at,
                    transcription_service, service_request_id, transcription_raw,
                    created_at, updated_at
             FROM recordings
             WHERE meeting_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let recordings = stmt
            .query_map(params![meeting_id], row_to_recording)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(recordings)
    }

    /// Get recordings waiting for transcription
    pub fn get_pending_recordings(&self) -> Result<Vec<Recording>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meeting_id, participant_id, audio_path, file_size, format, state,
                    processing_started_at, processing_completed_at,
                    transcription_service, service_request_id, transcription_raw,
                    created_at, updated_at
             FROM recordings
             WHERE state = 'pending'
             ORDER BY created_at ASC",
        )?;

        let recordings = stmt
            .query_map([], row_to_recording)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(recordings)
    }

    /// Update recording state
    pub fn update_recording_state(&self, id: &str, state: ProcessingState) -> Result<()> {
        self.conn.execute(
            "UPDATE recordings SET state = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, state.as_str(), Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Atomically claim a pending recording for processing.
    ///
    /// Returns false if the recording was already claimed, processed, or
    /// removed; duplicate task deliveries become no-ops through this check.
    pub fn begin_processing(&self, id: &str) -> Result<bool> {
        let now = Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE recordings
             SET state = 'processing', processing_started_at = ?2, updated_at = ?2
             WHERE id = ?1 AND state = 'pending'",
            params![id, now],
        )?;
        Ok(changed == 1)
    }

    /// Count recordings of a meeting by completion state
    pub fn recording_counts(&self, meeting_id: i64) -> Result<RecordingCounts> {
        let (total, processed, failed): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(state = 'processed'), 0),
                    COALESCE(SUM(state = 'failed'), 0)
             FROM recordings WHERE meeting_id = ?1",
            params![meeting_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(RecordingCounts {
            total: total as usize,
            processed: processed as usize,
            failed: failed as usize,
        })
    }

    // ------------------------------------------------------------------
    // Segments
    // ------------------------------------------------------------------

    /// Insert multiple segments in a transaction
    pub fn insert_segments(&self, segments: &[Segment]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for segment in segments {
            tx.execute(
                r#"
                INSERT INTO segments (recording_id, start_time, end_time, text, confidence,
                                      speaker_label, speaker_name, agenda_item_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    segment.recording_id,
                    segment.start_time,
                    segment.end_time,
                    segment.text,
                    segment.confidence,
                    segment.speaker_label,
                    segment.speaker_name,
                    segment.agenda_item_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Get segments for a recording, ordered by start time
    pub fn get_segments(&self, recording_id: &str) -> Result<Vec<Segment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recording_id, start_time, end_time, text, confidence,
                    speaker_label, speaker_name, agenda_item_id
             FROM segments
             WHERE recording_id = ?1
             ORDER BY start_time",
        )?;

        let segments = stmt
            .query_map(params![recording_id], row_to_segment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(segments)
    }

    /// Get every segment across all processed recordings of a meeting.
    ///
    /// Consumers must treat the result as unordered; the merge step re-sorts.
    pub fn get_processed_segments(&self, meeting_id: i64) -> Result<Vec<Segment>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.recording_id, s.start_time, s.end_time, s.text, s.confidence,
                    s.speaker_label, s.speaker_name, s.agenda_item_id
             FROM segments s
             JOIN recordings r ON s.recording_id = r.id
             WHERE r.meeting_id = ?1 AND r.state = 'processed'",
        )?;

        let segments = stmt
            .query_map(params![meeting_id], row_to_segment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(segments)
    }

    // ------------------------------------------------------------------
    // Summaries
    // ------------------------------------------------------------------

    /// Create the summary row for a meeting if it does not exist yet
    pub fn ensure_summary(&self, meeting_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO summaries (meeting_id) VALUES (?1)",
            params![meeting_id],
        )?;
        Ok(())
    }

    /// Atomically claim the one-shot AI dispatch for a meeting.
    ///
    /// The UPDATE both checks and flips the flag, so of two recordings
    /// completing at the same time exactly one caller gets true.
    pub fn claim_summary_dispatch(&self, meeting_id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE summaries SET ai_dispatched = 1 WHERE meeting_id = ?1 AND ai_dispatched = 0",
            params![meeting_id],
        )?;
        Ok(changed == 1)
    }

    /// Overwrite the merged raw transcript of a meeting's summary
    pub fn set_summary_raw_transcript(&self, meeting_id: i64, transcript: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE summaries SET raw_transcript = ?2 WHERE meeting_id = ?1",
            params![meeting_id, transcript],
        )?;
        Ok(())
    }

    /// Get the summary of a meeting
    pub fn get_summary(&self, meeting_id: i64) -> Result<Option<Summary>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, meeting_id, raw_transcript, clean_transcript, executive_summary,
                        key_points, action_items, decisions_made, participants_summary,
                        is_ai_processed, ai_processing_started_at, ai_processing_completed_at
                 FROM summaries WHERE meeting_id = ?1",
                params![meeting_id],
                row_to_summary,
            )
            .optional()?;

        Ok(result)
    }

    /// Persist the analysis fields of a summary (overwrites in place)
    pub fn update_summary(&self, summary: &Summary) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE summaries
            SET raw_transcript = ?2, clean_transcript = ?3, executive_summary = ?4,
                key_points = ?5, action_items = ?6, decisions_made = ?7,
                participants_summary = ?8, is_ai_processed = ?9,
                ai_processing_started_at = ?10, ai_processing_completed_at = ?11
            WHERE meeting_id = ?1
            "#,
            params![
                summary.meeting_id,
                summary.raw_transcript,
                summary.clean_transcript,
                summary.executive_summary,
                serde_json::to_string(&summary.key_points)?,
                serde_json::to_string(&summary.action_items)?,
                serde_json::to_string(&summary.decisions_made)?,
                serde_json::to_string(&summary.participants_summary)?,
                summary.is_ai_processed,
                summary.ai_processing_started_at.map(|t| t.timestamp()),
                summary.ai_processing_completed_at.map(|t| t.timestamp()),
            ],
        )?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Quality metrics and coordination decisions
    // ------------------------------------------------------------------

    /// Append a quality metric reading and return its row id
    pub fn insert_quality_metric(&self, metric: &QualityMetric) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO quality_metrics (participant_id, volume_level, background_noise,
                                         clarity_score, proximity_score, overall_score, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                metric.participant_id,
                metric.volume_level,
                metric.background_noise,
                metric.clarity_score,
                metric.proximity_score,
                metric.overall_score,
                metric.created_at.timestamp(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Persist the derived overall score onto a metric row
    pub fn set_metric_overall_score(&self, metric_id: i64, score: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE quality_metrics SET overall_score = ?2 WHERE id = ?1",
            params![metric_id, score],
        )?;
        Ok(())
    }

    /// Latest quality metric for a participant.
    ///
    /// Ordering is explicit: latest created_at wins, ties broken by highest id.
    pub fn latest_quality_metric(&self, participant_id: i64) -> Result<Option<QualityMetric>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, participant_id, volume_level, background_noise, clarity_score,
                        proximity_score, overall_score, created_at
                 FROM quality_metrics
                 WHERE participant_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![participant_id],
                row_to_quality_metric,
            )
            .optional()?;

        Ok(result)
    }

    /// Append a coordination decision audit record and return its row id
    pub fn insert_coordination_decision(&self, decision: &CoordinationDecision) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO coordination_decisions (meeting_id, primary_recorder_id, backup_recorder_ids,
                                                algorithm_version, decision_factors, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                decision.meeting_id,
                decision.primary_recorder_id,
                serde_json::to_string(&decision.backup_recorder_ids)?,
                decision.algorithm_version,
                serde_json::to_string(&decision.decision_factors)?,
                decision.created_at.timestamp(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }
}

// Row mapping helpers

fn from_ts(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

fn from_opt_ts(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.map(from_ts)
}

fn row_to_meeting(row: &rusqlite::Row) -> rusqlite::Result<Meeting> {
    let state_str: String = row.get(4)?;
    let started_at: Option<i64> = row.get(5)?;
    let ended_at: Option<i64> = row.get(6)?;
    let created_at: i64 = row.get(7)?;
    let updated_at: i64 = row.get(8)?;

    Ok(Meeting {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        host: row.get(3)?,
        state: MeetingState::from_str(&state_str).unwrap_or(MeetingState::Scheduled),
        started_at: from_opt_ts(started_at),
        ended_at: from_opt_ts(ended_at),
        created_at: from_ts(created_at),
        updated_at: from_ts(updated_at),
    })
}

fn row_to_participant(row: &rusqlite::Row) -> rusqlite::Result<Participant> {
    let joined_at: i64 = row.get(6)?;

    Ok(Participant {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        user: row.get(2)?,
        session_id: row.get(3)?,
        is_recording: row.get(4)?,
        audio_quality_score: row.get(5)?,
        joined_at: from_ts(joined_at),
    })
}

fn row_to_recording(row: &rusqlite::Row) -> rusqlite::Result<Recording> {
    let state_str: String = row.get(6)?;
    let started: Option<i64> = row.get(7)?;
    let completed: Option<i64> = row.get(8)?;
    let raw_json: Option<String> = row.get(11)?;
    let created_at: i64 = row.get(12)?;
    let updated_at: i64 = row.get(13)?;

    Ok(Recording {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        participant_id: row.get(2)?,
        audio_path: row.get(3)?,
        file_size: row.get(4)?,
        format: row.get(5)?,
        state: ProcessingState::from_str(&state_str).unwrap_or(ProcessingState::Pending),
        processing_started_at: from_opt_ts(started),
        processing_completed_at: from_opt_ts(completed),
        transcription_service: row.get(9)?,
        service_request_id: row.get(10)?,
        transcription_raw: raw_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: from_ts(created_at),
        updated_at: from_ts(updated_at),
    })
}

fn row_to_segment(row: &rusqlite::Row) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        recording_id: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        text: row.get(4)?,
        confidence: row.get(5)?,
        speaker_label: row.get(6)?,
        speaker_name: row.get(7)?,
        agenda_item_id: row.get(8)?,
    })
}

fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<Summary> {
    let key_points: String = row.get(5)?;
    let action_items: String = row.get(6)?;
    let decisions: String = row.get(7)?;
    let participants: String = row.get(8)?;
    let started: Option<i64> = row.get(10)?;
    let completed: Option<i64> = row.get(11)?;

    Ok(Summary {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        raw_transcript: row.get(2)?,
        clean_transcript: row.get(3)?,
        executive_summary: row.get(4)?,
        key_points: serde_json::from_str(&key_points).unwrap_or_default(),
        action_items: serde_json::from_str(&action_items).unwrap_or_default(),
        decisions_made: serde_json::from_str(&decisions).unwrap_or_default(),
        participants_summary: serde_json::from_str(&participants)
            .unwrap_or_else(|_| serde_json::json!({})),
        is_ai_processed: row.get(9)?,
        ai_processing_started_at: from_opt_ts(started),
        ai_processing_completed_at: from_opt_ts(completed),
    })
}

fn row_to_quality_metric(row: &rusqlite::Row) -> rusqlite::Result<QualityMetric> {
    let created_at: i64 = row.get(7)?;

    Ok(QualityMetric {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        volume_level: row.get(2)?,
        background_noise: row.get(3)?,
        clarity_score: row.get(4)?,
        proximity_score: row.get(5)?,
        overall_score: row.get(6)?,
        created_at: from_ts(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_meeting(db: &Database) -> (Meeting, Participant) {
        let mut meeting = Meeting::new("Test Meeting".to_string(), Some("alice".to_string()), 8);
        meeting.id = db.insert_meeting(&meeting).unwrap();

        let mut participant =
            Participant::new(meeting.id, "session-1".to_string(), Some("alice".to_string()));
        participant.id = db.insert_participant(&participant).unwrap();

        (meeting, participant)
    }

    #[test]
    fn test_create_database() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn test_insert_and_get_meeting() {
        let db = Database::open_memory().unwrap();
        let (meeting, _) = seed_meeting(&db);

        let retrieved = db.get_meeting(&meeting.code).unwrap().unwrap();
        assert_eq!(retrieved.title, "Test Meeting");
        assert_eq!(retrieved.state, MeetingState::Scheduled);
    }

    #[test]
    fn test_recording_state_transitions() {
        let db = Database::open_memory().unwrap();
        let (meeting, participant) = seed_meeting(&db);

        let recording = Recording::new(
            meeting.id,
            participant.id,
            "recordings/a.webm".to_string(),
            "webm".to_string(),
        );
        db.insert_recording(&recording).unwrap();

        assert!(db.begin_processing(&recording.id).unwrap());
        // A second claim on the same recording must fail
        assert!(!db.begin_processing(&recording.id).unwrap());

        db.update_recording_state(&recording.id, ProcessingState::Processed)
            .unwrap();
        let counts = db.recording_counts(meeting.id).unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.processed, 1);
        assert!(counts.is_ready());
    }

    #[test]
    fn test_failed_recording_blocks_readiness() {
        let db = Database::open_memory().unwrap();
        let (meeting, participant) = seed_meeting(&db);

        let recording = Recording::new(
            meeting.id,
            participant.id,
            "recordings/a.webm".to_string(),
            "webm".to_string(),
        );
        db.insert_recording(&recording).unwrap();
        db.update_recording_state(&recording.id, ProcessingState::Failed)
            .unwrap();

        let counts = db.recording_counts(meeting.id).unwrap();
        assert_eq!(counts.failed, 1);
        assert!(!counts.is_ready());
    }

    #[test]
    fn test_summary_dispatch_claimed_once() {
        let db = Database::open_memory().unwrap();
        let (meeting, _) = seed_meeting(&db);

        db.ensure_summary(meeting.id).unwrap();
        assert!(db.claim_summary_dispatch(meeting.id).unwrap());
        assert!(!db.claim_summary_dispatch(meeting.id).unwrap());
    }

    #[test]
    fn test_latest_quality_metric_tie_break() {
        let db = Database::open_memory().unwrap();
        let (_, participant) = seed_meeting(&db);

        // Two readings with identical timestamps; highest id wins
        let mut first = QualityMetric::new(participant.id);
        first.volume_level = Some(0.2);
        let mut second = QualityMetric::new(participant.id);
        second.created_at = first.created_at;
        second.volume_level = Some(0.9);

        db.insert_quality_metric(&first).unwrap();
        db.insert_quality_metric(&second).unwrap();

        let latest = db.latest_quality_metric(participant.id).unwrap().unwrap();
        assert_eq!(latest.volume_level, Some(0.9));
    }

    #[test]
    fn test_deleting_meeting_cascades() {
        let db = Database::open_memory().unwrap();
        let (meeting, participant) = seed_meeting(&db);

        let recording = Recording::new(
            meeting.id,
            participant.id,
            "recordings/a.webm".to_string(),
            "webm".to_string(),
        );
        db.insert_recording(&recording).unwrap();
        let segment = Segment::new(recording.id.clone(), 0.0, 1.0, "hello".to_string());
        db.insert_segments(&[segment]).unwrap();

        db.delete_meeting(meeting.id).unwrap();

        assert!(db.get_recording(&recording.id).unwrap().is_none());
        assert!(db.get_segments(&recording.id).unwrap().is_empty());
    }
}
