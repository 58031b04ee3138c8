//! Outbound email: invitations and summary notifications
//!
//! Delivery is deliberately non-fatal. A mailer reports the outcome as
//! data instead of an error, so a down email provider never blocks the
//! processing pipeline.

mod sendgrid;

pub use sendgrid::SendGridClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Settings;
use crate::storage::{Meeting, Summary};

/// One plain-text email ready to hand to a provider
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outcome of a delivery attempt, success or not
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub success: bool,
    pub message: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Attempt delivery. Failures come back as an unsuccessful report,
    /// never as an error.
    async fn send(&self, message: &EmailMessage) -> DeliveryReport;
}

/// Build a mailer from runtime settings.
pub fn build_mailer(settings: &Settings) -> Result<Box<dyn Mailer>> {
    match settings.email.provider.to_lowercase().as_str() {
        "sendgrid" => Ok(Box::new(SendGridClient::from_settings(settings)?)),
        other => anyhow::bail!(
            "Unsupported email.provider '{}'. Supported providers: sendgrid",
            other
        ),
    }
}

/// Compose a meeting invitation for one recipient.
pub fn invitation_message(meeting: &Meeting, recipient: &str) -> EmailMessage {
    let host = meeting.host.as_deref().unwrap_or("Meeting Host");

    EmailMessage {
        to: recipient.to_string(),
        subject: format!("Meeting Invitation - {} ({})", meeting.title, meeting.code),
        body: format!(
            "Hello,\n\n{} has invited you to the meeting \"{}\".\n\nJoin with the meeting code: {}\n\n- Huddle",
            host, meeting.title, meeting.code
        ),
    }
}

/// Compose the notification sent once a meeting summary is ready.
pub fn summary_ready_message(meeting: &Meeting, summary: &Summary, recipient: &str) -> EmailMessage {
    EmailMessage {
        to: recipient.to_string(),
        subject: format!("Meeting Summary Ready - {} ({})", meeting.title, meeting.code),
        body: format!(
            "Hello,\n\nThe summary for \"{}\" is ready.\n\nExecutive summary:\n{}\n\nOpen Huddle and run `huddle summary {}` for the full minutes.\n\n- Huddle",
            meeting.title, summary.executive_summary, meeting.code
        ),
    }
}
