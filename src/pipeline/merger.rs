//! Merging per-recording segments into one meeting transcript

use crate::storage::Segment;

/// Speaker name used when diarization produced no label
pub const UNKNOWN_SPEAKER: &str = "Unknown Speaker";

/// One run of consecutive segments from the same speaker
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerTurn {
    pub speaker: String,
    pub text: String,
}

/// Order segments from every recording into one timeline.
///
/// The sort is stable, so segments sharing a start time keep their
/// insertion order.
pub fn merge_segments(mut segments: Vec<Segment>) -> Vec<Segment> {
    segments.sort_by(|a, b| {
        a.start_time
            .partial_cmp(&b.start_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    segments
}

/// Group a time-ordered segment list into speaker turns.
///
/// Consecutive segments from the same speaker collapse into one turn;
/// the same speaker reappearing later starts a new turn.
pub fn group_by_speaker(segments: &[Segment]) -> Vec<SpeakerTurn> {
    let mut turns: Vec<SpeakerTurn> = Vec::new();

    for segment in segments {
        let speaker = segment
            .speaker_name
            .as_deref()
            .unwrap_or(UNKNOWN_SPEAKER);

        match turns.last_mut() {
            Some(turn) if turn.speaker == speaker => {
                turn.text.push(' ');
                turn.text.push_str(&segment.text);
            }
            _ => turns.push(SpeakerTurn {
                speaker: speaker.to_string(),
                text: segment.text.clone(),
            }),
        }
    }

    turns
}

/// Render speaker turns as the canonical meeting transcript.
///
/// Each turn opens on a new line with a `Speaker:` marker followed by
/// the turn text.
pub fn render_transcript(turns: &[SpeakerTurn]) -> String {
    let mut lines = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        lines.push(format!("\n{}:", turn.speaker));
        lines.push(turn.text.clone());
    }
    lines.join(" ")
}
