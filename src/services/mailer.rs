use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::config::MailConfig;

#[derive(Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Thin client for the mail relay. Delivery is best effort everywhere this
/// is used: a relay outage must never fail the request that triggered the
/// email.
pub struct Mailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl Mailer {
    #[must_use]
    pub const fn new(client: reqwest::Client, config: MailConfig) -> Self {
        Self { client, config }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let mail = OutboundMail {
            from: &self.config.from_address,
            to,
            subject,
            body,
        };

        let mut request = self.client.post(&self.config.relay_url).json(&mail);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("Mail relay unreachable")?;

        if !response.status().is_success() {
            anyhow::bail!("Mail relay rejected message with status {}", response.status());
        }

        Ok(())
    }

    /// Fire-and-forget send. Failure is logged and swallowed.
    pub fn send_detached(self: &Arc<Self>, to: String, subject: String, body: String) {
        let mailer = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &subject, &body).await {
                warn!(to, error = %e, "Failed to send email");
            }
        });
    }
}
