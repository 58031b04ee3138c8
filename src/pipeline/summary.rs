//! Two-pass AI summarization
//!
//! Pass one rewrites the merged raw transcript into a readable clean
//! transcript; pass two extracts structured minutes from it. Both
//! passes degrade instead of failing: a broken cleanup falls back to
//! the raw transcript, a broken analysis falls back to a placeholder
//! that asks for manual review.

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::llm::prompts::{
    analysis_user_prompt, cleanup_user_prompt, MeetingContext, ANALYSIS_SYSTEM_PROMPT,
    CLEANUP_SYSTEM_PROMPT,
};
use crate::llm::{build_chat_model, ChatModel, ChatRequest};
use crate::storage::{ActionItem, Database, Meeting, MeetingState};

const CLEANUP_TEMPERATURE: f64 = 0.1;
const CLEANUP_MAX_TOKENS: u32 = 4000;
const ANALYSIS_TEMPERATURE: f64 = 0.2;
const ANALYSIS_MAX_TOKENS: u32 = 2000;

const FALLBACK_SUMMARY: &str =
    "Meeting analysis could not be completed automatically. Please review transcript manually.";

/// Structured analysis extracted from a clean transcript.
///
/// Every field defaults, so a partially valid model response keeps
/// whatever it did provide.
#[derive(Debug, Deserialize)]
struct MeetingAnalysis {
    #[serde(default = "fallback_summary")]
    executive_summary: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    action_items: Vec<ActionItem>,
    #[serde(default)]
    decisions_made: Vec<String>,
    #[serde(default = "empty_object")]
    participants_summary: Value,
}

fn fallback_summary() -> String {
    FALLBACK_SUMMARY.to_string()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Default for MeetingAnalysis {
    fn default() -> Self {
        Self {
            executive_summary: fallback_summary(),
            key_points: Vec::new(),
            action_items: Vec::new(),
            decisions_made: Vec::new(),
            participants_summary: empty_object(),
        }
    }
}

/// Generates clean transcripts and structured minutes for ready meetings
pub struct SummaryGenerator {
    chat: Box<dyn ChatModel>,
    cleanup_model: String,
    analysis_model: String,
}

impl SummaryGenerator {
    /// Create a generator with an explicit backend (used by tests)
    pub fn new(chat: Box<dyn ChatModel>, cleanup_model: String, analysis_model: String) -> Self {
        Self {
            chat,
            cleanup_model,
            analysis_model,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            chat: build_chat_model(settings)?,
            cleanup_model: settings.llm.cleanup_model.trim().to_string(),
            analysis_model: settings.llm.analysis_model.trim().to_string(),
        })
    }

    /// Run both passes for one meeting and persist the result.
    ///
    /// Returns Ok(true) when the summary row ends up AI-processed,
    /// Ok(false) when there was nothing to process. Re-running on an
    /// already processed summary is a no-op.
    pub async fn process_meeting(&self, db: &Database, meeting_id: i64) -> Result<bool> {
        let Some(meeting) = db.get_meeting_by_id(meeting_id)? else {
            anyhow::bail!("Meeting {} not found", meeting_id);
        };
        let Some(mut summary) = db.get_summary(meeting_id)? else {
            anyhow::bail!("No summary row for meeting {}", meeting.code);
        };

        if summary.is_ai_processed {
            info!("Meeting {} already summarized, skipping", meeting.code);
            return Ok(true);
        }

        if summary.raw_transcript.trim().is_empty() {
            error!("No raw transcript available for meeting {}", meeting.code);
            return Ok(false);
        }

        info!("Starting AI processing for meeting {}", meeting.code);
        summary.ai_processing_started_at = Some(Utc::now());
        db.update_summary(&summary)?;

        let clean = self.clean_transcript(&summary.raw_transcript).await;
        let context = self.meeting_context(db, &meeting)?;
        let analysis = self.analyze_meeting(&clean, &context).await;

        summary.clean_transcript = clean;
        summary.executive_summary = analysis.executive_summary;
        summary.key_points = analysis.key_points;
        summary.action_items = analysis.action_items;
        summary.decisions_made = analysis.decisions_made;
        summary.participants_summary = analysis.participants_summary;
        summary.is_ai_processed = true;
        summary.ai_processing_completed_at = Some(Utc::now());
        db.update_summary(&summary)?;

        self.complete_meeting(db, meeting)?;

        info!("AI processing completed for meeting {}", meeting_id);
        Ok(true)
    }

    /// Cleanup pass. Any failure falls back to the raw transcript.
    async fn clean_transcript(&self, raw_transcript: &str) -> String {
        let request = ChatRequest {
            model: &self.cleanup_model,
            system: CLEANUP_SYSTEM_PROMPT,
            user: &cleanup_user_prompt(raw_transcript),
            temperature: CLEANUP_TEMPERATURE,
            max_tokens: CLEANUP_MAX_TOKENS,
        };

        match self.chat.complete(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Transcript cleaning returned empty text, keeping raw transcript");
                raw_transcript.to_string()
            }
            Err(e) => {
                error!("Transcript cleaning failed: {}", e);
                raw_transcript.to_string()
            }
        }
    }

    /// Analysis pass. Any failure falls back to the placeholder analysis.
    async fn analyze_meeting(&self, clean_transcript: &str, context: &MeetingContext) -> MeetingAnalysis {
        let request = ChatRequest {
            model: &self.analysis_model,
            system: ANALYSIS_SYSTEM_PROMPT,
            user: &analysis_user_prompt(context, clean_transcript),
            temperature: ANALYSIS_TEMPERATURE,
            max_tokens: ANALYSIS_MAX_TOKENS,
        };

        let text = match self.chat.complete(request).await {
            Ok(text) => text,
            Err(e) => {
                error!("Meeting analysis failed: {}", e);
                return MeetingAnalysis::default();
            }
        };

        match serde_json::from_str(strip_json_fences(&text)) {
            Ok(analysis) => analysis,
            Err(e) => {
                error!("Failed to parse AI analysis JSON: {}", e);
                MeetingAnalysis::default()
            }
        }
    }

    fn meeting_context(&self, db: &Database, meeting: &Meeting) -> Result<MeetingContext> {
        let agenda = db
            .list_agenda_items(meeting.id)?
            .into_iter()
            .map(|item| match item.owner {
                Some(owner) => format!("{}. {} (owner: {})", item.position, item.title, owner),
                None => format!("{}. {}", item.position, item.title),
            })
            .collect();

        Ok(MeetingContext {
            title: if meeting.title.trim().is_empty() {
                "Untitled Meeting".to_string()
            } else {
                meeting.title.clone()
            },
            date: meeting.created_at.format("%Y-%m-%d").to_string(),
            host: meeting
                .host
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            duration: self.estimate_duration(db, meeting)?,
            agenda,
        })
    }

    /// Prefer the tracked meeting span; fall back to the span between
    /// the first and last upload.
    fn estimate_duration(&self, db: &Database, meeting: &Meeting) -> Result<String> {
        if let (Some(started), Some(ended)) = (meeting.started_at, meeting.ended_at) {
            let minutes = (ended - started).num_minutes();
            return Ok(format!("{} minutes", minutes));
        }

        let recordings = db.list_recordings(meeting.id)?;
        if let (Some(first), Some(last)) = (
            recordings.iter().map(|r| r.created_at).min(),
            recordings.iter().map(|r| r.created_at).max(),
        ) {
            let minutes = (last - first).num_minutes();
            return Ok(format!("~{} minutes", minutes));
        }

        Ok("Duration unknown".to_string())
    }

    /// An active meeting whose summary landed is over.
    fn complete_meeting(&self, db: &Database, mut meeting: Meeting) -> Result<()> {
        if meeting.state != MeetingState::Active {
            return Ok(());
        }

        meeting.state = MeetingState::Completed;
        if meeting.ended_at.is_none() {
            meeting.ended_at = Some(Utc::now());
        }
        db.update_meeting(&meeting)?;
        Ok(())
    }
}

/// Strip a markdown code fence wrapped around a JSON payload.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
