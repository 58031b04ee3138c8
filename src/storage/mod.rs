//! Storage module for huddle
//!
//! SQLite persistence for the meeting pipeline plus the audio blob store.

mod blob;
mod database;
mod models;

pub use blob::{split_blob_path, AudioStore, LocalAudioStore};
pub use database::{Database, RecordingCounts};
pub use models::{
    ActionItem, AgendaItem, CoordinationDecision, Meeting, MeetingState, Participant,
    ProcessingState, QualityMetric, Recording, Segment, Summary,
};
