//! reCAPTCHA v2 verification
//!
//! The form posts the widget token as `g-recaptcha-response`; the server
//! forwards it with its secret to Google's `siteverify` endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::config::CaptchaConfig;

#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("reCAPTCHA secret key is not configured")]
    MissingSecret,

    #[error("Network error: {0}")]
    Network(String),

    #[error("siteverify returned HTTP {0}")]
    Status(u16),

    #[error("Invalid siteverify response: {0}")]
    InvalidResponse(String),
}

/// Anything that can vouch for a CAPTCHA token
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Ok(true) when the token is valid for `remote_ip`
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<bool, CaptchaError>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
    #[serde(default)]
    hostname: Option<String>,
}

/// Google reCAPTCHA `siteverify` client
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    verify_url: String,
    secret: Option<String>,
    timeout: Duration,
}

impl RecaptchaVerifier {
    pub fn new(config: &CaptchaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            verify_url: config.verify_url.clone(),
            secret: config.secret_key.clone().filter(|s| !s.is_empty()),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<bool, CaptchaError> {
        let secret = self.secret.as_deref().ok_or(CaptchaError::MissingSecret)?;

        info!(ip = %remote_ip, token_len = token.len(), "Verifying reCAPTCHA");

        let response = self
            .client
            .post(&self.verify_url)
            .form(&[
                ("secret", secret),
                ("response", token),
                ("remoteip", remote_ip),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CaptchaError::Network(e.to_string()))?;

        let status = response.status();
        info!(status = %status, "siteverify responded");
        if !status.is_success() {
            return Err(CaptchaError::Status(status.as_u16()));
        }

        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::InvalidResponse(e.to_string()))?;

        if !body.success {
            error!(
                errors = ?body.error_codes,
                hostname = ?body.hostname,
                "reCAPTCHA rejected token"
            );
        }
        Ok(body.success)
    }
}
