use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::CaptchaConfig;

#[derive(Deserialize)]
struct VerifyResponse {
    success: bool,
}

/// Verifies registration captcha tokens against the provider. Disabled by
/// default; when disabled every token passes.
pub struct CaptchaVerifier {
    client: reqwest::Client,
    config: CaptchaConfig,
}

impl CaptchaVerifier {
    #[must_use]
    pub const fn new(client: reqwest::Client, config: CaptchaConfig) -> Self {
        Self { client, config }
    }

    pub async fn verify(&self, token: Option<&str>) -> Result<bool> {
        if !self.config.enabled {
            return Ok(true);
        }

        let Some(token) = token else {
            return Ok(false);
        };
        let Some(secret) = &self.config.secret else {
            anyhow::bail!("Captcha enabled but no secret configured");
        };

        let response = self
            .client
            .post(&self.config.verify_url)
            .form(&[("secret", secret.as_str()), ("response", token)])
            .send()
            .await
            .context("Captcha verifier unreachable")?
            .json::<VerifyResponse>()
            .await
            .context("Captcha verifier returned malformed response")?;

        Ok(response.success)
    }
}
