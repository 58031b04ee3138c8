//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// huddle - Meeting recording coordination, transcription, and AI minutes
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new meeting
    Create {
        /// Meeting title
        title: String,

        /// Host user name
        #[arg(long)]
        host: Option<String>,
    },

    /// Join a meeting as a participant
    Join {
        /// Meeting code
        meeting: String,

        /// Session identity for this device
        #[arg(short, long)]
        session: String,

        /// User name to join as
        #[arg(short, long)]
        user: Option<String>,

        /// Announce intent to record
        #[arg(short, long)]
        record: bool,
    },

    /// Add an agenda item to a meeting
    Agenda {
        /// Meeting code
        meeting: String,

        /// Agenda item title
        title: String,

        /// Participant responsible for the item
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Upload an audio recording for transcription
    Upload {
        /// Meeting code
        meeting: String,

        /// Session identity of the uploading participant
        #[arg(short, long)]
        session: String,

        /// Audio file to upload
        file: PathBuf,
    },

    /// Show meeting status and recording progress
    Status {
        /// Meeting code
        meeting: String,
    },

    /// Print the merged meeting transcript
    Transcript {
        /// Meeting code
        meeting: String,
    },

    /// Print the AI-generated meeting minutes
    Summary {
        /// Meeting code
        meeting: String,
    },

    /// Process pending recordings (worker loop by default)
    Process {
        /// Run a single pass instead of polling
        #[arg(long)]
        once: bool,
    },

    /// Select the primary recorder for a meeting
    Coordinate {
        /// Meeting code
        meeting: String,
    },

    /// Report an audio quality reading for a participant
    Quality {
        /// Meeting code
        meeting: String,

        /// Session identity of the participant
        #[arg(short, long)]
        session: String,

        /// Input volume level (0.0 - 1.0)
        #[arg(long)]
        volume: Option<f64>,

        /// Background noise level (0.0 - 1.0, lower is better)
        #[arg(long)]
        noise: Option<f64>,

        /// Speech clarity (0.0 - 1.0)
        #[arg(long)]
        clarity: Option<f64>,

        /// Microphone proximity (0.0 - 1.0)
        #[arg(long)]
        proximity: Option<f64>,
    },

    /// End a meeting
    End {
        /// Meeting code
        meeting: String,
    },

    /// Email a meeting invitation
    Invite {
        /// Meeting code
        meeting: String,

        /// Recipient email address
        email: String,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}
