//! Prompt construction for the two-pass transcript pipeline

/// System prompt for the transcript cleanup pass
pub const CLEANUP_SYSTEM_PROMPT: &str = "You are a professional transcript editor. Your job is to clean up meeting transcripts while preserving all important content and speaker identification.

Guidelines:
1. Remove filler words (um, uh, ah, like, you know)
2. Fix grammar and add proper punctuation
3. Format as clear paragraphs with proper speaker labels
4. Preserve all meaningful content - don't summarize
5. Keep technical terms and specific details intact
6. Use \"Speaker 1:\", \"Speaker 2:\" format consistently
7. Make it readable while staying true to what was said

Return only the cleaned transcript.";

/// System prompt for the structured analysis pass
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an AI meeting assistant specialized in analyzing meeting transcripts and generating professional meeting minutes.

Your task is to analyze the transcript and extract:
1. Executive Summary (2-3 sentences)
2. Key Discussion Points (organized by agenda items when possible)
3. Action Items (specific tasks with smart owner assignment)
4. Decisions Made (concrete decisions reached)
5. Participant Analysis (general engagement patterns)

IMPORTANT - Action Item Assignment Logic:
- If discussion happens during a specific agenda item, assign related action items to that agenda item's owner
- If no agenda context, look for explicit mentions in transcript (\"John will handle...\", \"Sarah, can you...\")
- If no clear owner, leave as \"TBD\" for admin review
- Consider the context and relevance when making assignments

Return your analysis in valid JSON format with these exact keys:
- executive_summary (string)
- key_points (array of strings, organize by agenda topics when clear)
- action_items (array of objects with: task, owner, due_date, priority, agenda_item)
- decisions_made (array of strings)
- participants_summary (object with general stats, no speaker identification needed)

Be specific and actionable. Use agenda context to intelligently assign action items.";

/// Meeting facts that anchor the analysis pass
pub struct MeetingContext {
    pub title: String,
    pub date: String,
    pub host: String,
    pub duration: String,
    /// Pre-rendered agenda lines, e.g. "1. Budget review (owner: alice)"
    pub agenda: Vec<String>,
}

impl MeetingContext {
    fn render(&self) -> String {
        let agenda = if self.agenda.is_empty() {
            "None".to_string()
        } else {
            self.agenda.join("\n")
        };

        format!(
            "Meeting Title: {}\nMeeting Date: {}\nHost: {}\nDuration: {}\n\nAgenda Items:\n{}",
            self.title, self.date, self.host, self.duration, agenda
        )
    }
}

/// Build the user prompt for the cleanup pass.
pub fn cleanup_user_prompt(raw_transcript: &str) -> String {
    format!(
        "Please clean this meeting transcript:\n\n{}\n\nMake it professional and readable while preserving all important information.",
        raw_transcript
    )
}

/// Build the user prompt for the analysis pass.
pub fn analysis_user_prompt(context: &MeetingContext, clean_transcript: &str) -> String {
    format!(
        "Meeting Context:\n{}\n\nTranscript:\n{}\n\nPlease analyze this meeting and provide structured output in JSON format.",
        context.render(),
        clean_transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_renders_agenda_lines() {
        let context = MeetingContext {
            title: "Planning".to_string(),
            date: "2025-06-01".to_string(),
            host: "alice".to_string(),
            duration: "45 minutes".to_string(),
            agenda: vec![
                "1. Budget review (owner: alice)".to_string(),
                "2. Hiring".to_string(),
            ],
        };

        let prompt = analysis_user_prompt(&context, "Speaker 1: hello");
        assert!(prompt.contains("Meeting Title: Planning"));
        assert!(prompt.contains("1. Budget review (owner: alice)"));
        assert!(prompt.contains("Speaker 1: hello"));
    }

    #[test]
    fn empty_agenda_renders_none() {
        let context = MeetingContext {
            title: "Standup".to_string(),
            date: "2025-06-01".to_string(),
            host: "Unknown".to_string(),
            duration: "Duration unknown".to_string(),
            agenda: vec![],
        };

        assert!(context.render().contains("Agenda Items:\nNone"));
    }
}
