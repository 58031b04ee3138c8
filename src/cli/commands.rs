//! CLI command implementations

use anyhow::Result;
use chrono::Local;
use std::path::Path;

use crate::cli::args::ConfigCommand;
use crate::config::Settings;
use crate::coordination::{RecorderSelector, RecordingPolicy};
use crate::email::{build_mailer, invitation_message};
use crate::pipeline::tasks;
use crate::service;
use crate::storage::{Database, LocalAudioStore};

fn recording_policy(settings: &Settings) -> Result<RecordingPolicy> {
    RecordingPolicy::from_str(&settings.coordination.policy).ok_or_else(|| {
        anyhow::anyhow!(
            "Unsupported coordination.policy '{}'. Supported policies: admin-only, best-quality",
            settings.coordination.policy
        )
    })
}

/// Create a new meeting
pub fn create_meeting(settings: &Settings, title: &str, host: Option<String>) -> Result<()> {
    let db = Database::open(settings)?;
    let meeting = service::create_meeting(
        &db,
        title,
        host.as_deref(),
        settings.general.meeting_code_length,
    )?;

    println!("Meeting created: {}", meeting.title);
    println!("  Code: {}", meeting.code);
    if let Some(host) = &meeting.host {
        println!("  Host: {}", host);
    }

    Ok(())
}

/// Join a meeting
pub fn join_meeting(
    settings: &Settings,
    meeting: &str,
    session: &str,
    user: Option<String>,
    record: bool,
) -> Result<()> {
    let db = Database::open(settings)?;
    let participant = service::join_meeting(&db, meeting, session, user.as_deref())?;
    if record {
        service::set_recording(&db, meeting, session, true)?;
    }

    println!(
        "Joined meeting {} as {}{}",
        meeting,
        participant.user.as_deref().unwrap_or(session),
        if record { " (recording)" } else { "" }
    );

    Ok(())
}

/// Add an agenda item
pub fn add_agenda_item(
    settings: &Settings,
    meeting: &str,
    title: &str,
    owner: Option<String>,
) -> Result<()> {
    let db = Database::open(settings)?;
    let item = service::add_agenda_item(&db, meeting, title, owner.as_deref())?;

    match &item.owner {
        Some(owner) => println!("Agenda item {}: {} (owner: {})", item.position, item.title, owner),
        None => println!("Agenda item {}: {}", item.position, item.title),
    }

    Ok(())
}

/// Upload an audio file and queue it for transcription
pub fn upload_recording(
    settings: &Settings,
    meeting: &str,
    session: &str,
    file: &Path,
) -> Result<()> {
    let audio = std::fs::read(file)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", file.display(), e))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid upload filename: {}", file.display()))?;

    let db = Database::open(settings)?;
    let store = LocalAudioStore::new(settings.audio_dir());
    let response = service::upload_recording(
        &db,
        &store,
        recording_policy(settings)?,
        service::UploadRequest {
            meeting: meeting.to_string(),
            session_id: session.to_string(),
            filename: filename.to_string(),
            audio,
        },
    )?;

    println!("Recording uploaded: {}", &response.recording_id[..8]);
    println!("Transcription queued. Run `huddle process` to drain the queue.");

    Ok(())
}

/// Show meeting status
pub fn show_status(settings: &Settings, meeting: &str) -> Result<()> {
    let db = Database::open(settings)?;
    let status = service::meeting_status(&db, meeting)?;

    println!("Meeting: {} ({})", status.meeting.title, status.meeting.code);
    println!("  State: {}", status.meeting.state.as_str());
    println!(
        "  Recordings: {} total, {} processed, {} failed",
        status.counts.total, status.counts.processed, status.counts.failed
    );
    println!(
        "  Summary: {}",
        if status.is_ready { "ready" } else { "waiting" }
    );
    println!("  Participants:");
    for p in &status.participants {
        let quality = p
            .audio_quality_score
            .map(|s| format!(", quality {:.2}", s))
            .unwrap_or_default();
        println!(
            "    {} [{}]{}{}",
            p.user.as_deref().unwrap_or("(anonymous)"),
            p.session_id,
            if p.is_recording { ", recording" } else { "" },
            quality
        );
    }

    Ok(())
}

/// Print the merged transcript for a meeting
pub fn show_transcript(settings: &Settings, meeting: &str) -> Result<()> {
    let db = Database::open(settings)?;
    let Some(m) = db.get_meeting(meeting)? else {
        anyhow::bail!("Meeting {} not found", meeting);
    };

    match db.get_summary(m.id)? {
        Some(summary) if !summary.raw_transcript.is_empty() => {
            println!("{}", summary.full_transcript().trim_start());
        }
        _ => {
            println!("No transcript yet. Recordings may still be processing.");
        }
    }

    Ok(())
}

/// Print the AI-generated minutes for a meeting
pub fn show_summary(settings: &Settings, meeting: &str) -> Result<()> {
    let db = Database::open(settings)?;
    let Some(m) = db.get_meeting(meeting)? else {
        anyhow::bail!("Meeting {} not found", meeting);
    };

    let summary = match db.get_summary(m.id)? {
        Some(summary) if summary.is_ai_processed => summary,
        _ => {
            println!("Summary not ready yet for meeting {}.", m.code);
            return Ok(());
        }
    };

    println!("# {} ({})", m.title, m.code);
    println!();
    println!("{}", summary.executive_summary);

    if !summary.key_points.is_empty() {
        println!("\nKey points:");
        for point in &summary.key_points {
            println!("  - {}", point);
        }
    }

    if !summary.action_items.is_empty() {
        println!("\nAction items:");
        for item in &summary.action_items {
            let mut line = format!("  - {} (owner: {}", item.task, item.owner);
            if let Some(due) = &item.due_date {
                line.push_str(&format!(", due {}", due));
            }
            if let Some(priority) = &item.priority {
                line.push_str(&format!(", {}", priority));
            }
            line.push(')');
            println!("{}", line);
        }
    }

    if !summary.decisions_made.is_empty() {
        println!("\nDecisions:");
        for decision in &summary.decisions_made {
            println!("  - {}", decision);
        }
    }

    Ok(())
}

/// Run the processing worker, or a single pass with `--once`
pub async fn process_command(settings: &Settings, once: bool) -> Result<()> {
    settings.ensure_dirs()?;

    if once {
        let processed = tasks::process_pending(settings).await?;
        println!("Processed {} recording(s)", processed);
        return Ok(());
    }

    tasks::run_worker(settings).await
}

/// Select and record the primary recorder for a meeting
pub fn coordinate_meeting(settings: &Settings, meeting: &str) -> Result<()> {
    let db = Database::open(settings)?;
    let Some(m) = db.get_meeting(meeting)? else {
        anyhow::bail!("Meeting {} not found", meeting);
    };

    let selector = RecorderSelector::new(recording_policy(settings)?);
    match selector.create_decision(&db, &m)? {
        Some(decision) => {
            println!(
                "Primary recorder: participant {} ({})",
                decision.primary_recorder_id, decision.algorithm_version
            );
            if !decision.backup_recorder_ids.is_empty() {
                println!("Backups: {:?}", decision.backup_recorder_ids);
            }
        }
        None => {
            println!("No eligible recording participant in meeting {}.", m.code);
        }
    }

    Ok(())
}

/// Record a quality reading for a participant
pub fn record_quality(
    settings: &Settings,
    meeting: &str,
    session: &str,
    volume: Option<f64>,
    noise: Option<f64>,
    clarity: Option<f64>,
    proximity: Option<f64>,
) -> Result<()> {
    let db = Database::open(settings)?;
    let metric =
        service::record_quality_metric(&db, meeting, session, volume, noise, clarity, proximity)?;

    println!(
        "Quality recorded for {}: {:.3}",
        session,
        metric.overall_score.unwrap_or(0.0)
    );

    Ok(())
}

/// End a meeting
pub fn end_meeting(settings: &Settings, meeting: &str) -> Result<()> {
    let db = Database::open(settings)?;
    let meeting = service::end_meeting(&db, meeting)?;

    let ended = meeting
        .ended_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("Meeting {} ended at {}", meeting.code, ended);

    Ok(())
}

/// Email a meeting invitation
pub async fn invite_participant(settings: &Settings, meeting: &str, email: &str) -> Result<()> {
    let db = Database::open(settings)?;
    let Some(m) = db.get_meeting(meeting)? else {
        anyhow::bail!("Meeting {} not found", meeting);
    };

    let mailer = build_mailer(settings)?;
    let report = mailer.send(&invitation_message(&m, email)).await;

    println!("{}", report.message);
    if !report.success {
        anyhow::bail!("Invitation delivery failed");
    }

    Ok(())
}

/// Configuration management
pub fn config_command(settings: &Settings, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let toml = toml::to_string_pretty(settings)?;
            println!("{}", toml);
        }
        ConfigCommand::Path => {
            let path = Settings::config_path()?;
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            let path = Settings::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Settings::write_default(&path)?;
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}
