//! Recorder coordination for huddle
//!
//! Scores per-participant audio quality and selects which participant's
//! device is authoritative for recording a meeting.

mod scoring;
mod selector;

pub use scoring::{score_metric, score_and_store, QUALITY_WEIGHTS};
pub use selector::{RecorderSelector, RecordingPolicy};
