use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::warn;

use crate::config::Settings;
use crate::email::{DeliveryReport, EmailMessage, Mailer};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridClient {
    http: Client,
    api_key: String,
    from_address: String,
}

impl SendGridClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.email.api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!(
                "SendGrid API key is missing. Set email.api_key in config or HUDDLE_SENDGRID_API_KEY."
            );
        }

        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .context("Failed to build SendGrid HTTP client")?,
            api_key,
            from_address: settings.email.from_address.trim().to_string(),
        })
    }

    async fn try_send(&self, message: &EmailMessage) -> Result<()> {
        let body = SendGridRequest {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: &message.to,
                }],
            }],
            from: Address {
                email: &self.from_address,
            },
            subject: &message.subject,
            content: vec![Content {
                content_type: "text/plain",
                value: &message.body,
            }],
        };

        let response = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("SendGrid request failed")?;

        response
            .error_for_status()
            .context("SendGrid returned an error status")?;

        Ok(())
    }
}

#[async_trait]
impl Mailer for SendGridClient {
    async fn send(&self, message: &EmailMessage) -> DeliveryReport {
        match self.try_send(message).await {
            Ok(()) => DeliveryReport {
                success: true,
                message: format!("Email sent to {}", message.to),
            },
            Err(e) => {
                warn!("Email delivery to {} failed: {}", message.to, e);
                DeliveryReport {
                    success: false,
                    message: format!("Failed to send email to {}: {}", message.to, e),
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SendGridRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}
