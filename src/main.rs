//! huddle - Meeting recording coordination, transcription, and AI minutes
//!
//! Entry point for the huddle CLI application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use huddle::cli::{Cli, Commands};
use huddle::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            huddle::cli::completions::print(shell);
        }
        command => {
            // Load configuration only for runtime commands.
            let settings = Settings::load()?;

            match command {
                Commands::Create { title, host } => {
                    huddle::cli::commands::create_meeting(&settings, &title, host)?;
                }
                Commands::Join {
                    meeting,
                    session,
                    user,
                    record,
                } => {
                    huddle::cli::commands::join_meeting(&settings, &meeting, &session, user, record)?;
                }
                Commands::Agenda {
                    meeting,
                    title,
                    owner,
                } => {
                    huddle::cli::commands::add_agenda_item(&settings, &meeting, &title, owner)?;
                }
                Commands::Upload {
                    meeting,
                    session,
                    file,
                } => {
                    huddle::cli::commands::upload_recording(&settings, &meeting, &session, &file)?;
                }
                Commands::Status { meeting } => {
                    huddle::cli::commands::show_status(&settings, &meeting)?;
                }
                Commands::Transcript { meeting } => {
                    huddle::cli::commands::show_transcript(&settings, &meeting)?;
                }
                Commands::Summary { meeting } => {
                    huddle::cli::commands::show_summary(&settings, &meeting)?;
                }
                Commands::Process { once } => {
                    huddle::cli::commands::process_command(&settings, once).await?;
                }
                Commands::Coordinate { meeting } => {
                    huddle::cli::commands::coordinate_meeting(&settings, &meeting)?;
                }
                Commands::Quality {
                    meeting,
                    session,
                    volume,
                    noise,
                    clarity,
                    proximity,
                } => {
                    huddle::cli::commands::record_quality(
                        &settings, &meeting, &session, volume, noise, clarity, proximity,
                    )?;
                }
                Commands::End { meeting } => {
                    huddle::cli::commands::end_meeting(&settings, &meeting)?;
                }
                Commands::Invite { meeting, email } => {
                    huddle::cli::commands::invite_participant(&settings, &meeting, &email).await?;
                }
                Commands::Config(config_cmd) => {
                    huddle::cli::commands::config_command(&settings, config_cmd)?;
                }
                Commands::Completions { .. } => unreachable!(),
            }
        }
    }

    Ok(())
}
