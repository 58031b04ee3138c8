//! Meeting processing pipeline
//!
//! Recordings flow through transcription into segments; when every
//! recording of a meeting has been transcribed, the segments merge into a
//! single diarized transcript and a two-pass AI summary is generated.

mod merger;
mod readiness;
mod summary;
pub mod tasks;

pub use merger::{group_by_speaker, merge_segments, render_transcript, SpeakerTurn};
pub use readiness::check_and_dispatch;
pub use summary::SummaryGenerator;
