//! Confirmation mail via a transactional mail HTTP API
//!
//! The API takes a JSON message (`from`, `to`, `subject`, `html`, `text`)
//! with a bearer key. Delivery problems are reported to the caller, which
//! logs them; a failed mail never fails the submission.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::config::MailConfig;
use crate::form::ContactSubmission;
use crate::html::escape_html;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Mail API rejected message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// HTTP client for the transactional mail API
pub struct ApiMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl ApiMailer {
    /// None when mail is disabled or no API key is configured
    pub fn from_config(config: &MailConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let api_key = config.api_key.clone().filter(|k| !k.is_empty())?;
        Some(Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl Mailer for ApiMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(mail)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MailError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        info!(to = ?mail.to, "Confirmation mail sent");
        Ok(())
    }
}

/// Confirmation sent to the submitter
pub fn confirmation_mail(config: &MailConfig, submission: &ContactSubmission) -> OutgoingMail {
    let text = format!(
        "Hi {name},\n\n\
         Thanks for reaching out to Envision! We received your request to get involved.\n\n\
         Role: {role}\n\
         Affiliation: {affiliation}\n\
         Message:\n{message}\n\n\
         Our team will get back to you soon.\n\n\
         - The Envision Team\n",
        name = submission.name,
        role = submission.role.label(),
        affiliation = submission.affiliation,
        message = submission.message,
    );

    let html = format!(
        "<p>Hi {name},</p>\
         <p>Thanks for reaching out to Envision! We received your request to get involved.</p>\
         <p><strong>Role:</strong> {role}</p>\
         <p><strong>Affiliation:</strong> {affiliation}</p>\
         <p><strong>Message:</strong><br>{message}</p>\
         <p>Our team will get back to you soon.</p>\
         <p>- The Envision Team</p>",
        name = escape_html(&submission.name),
        role = submission.role.label(),
        affiliation = escape_html(&submission.affiliation),
        message = escape_html(&submission.message).replace('\n', "<br>"),
    );

    OutgoingMail {
        from: config.from.clone(),
        to: vec![submission.email.clone()],
        subject: config.subject.clone(),
        html,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Role;

    fn submission() -> ContactSubmission {
        ContactSubmission {
            name: "Ann <Lee>".to_string(),
            email: "ann@x.com".to_string(),
            affiliation: "Princeton".to_string(),
            role: Role::Attendee,
            message: "See you there".to_string(),
        }
    }

    #[test]
    fn test_confirmation_mail() {
        let config = MailConfig::default();
        let mail = confirmation_mail(&config, &submission());

        assert_eq!(mail.to, vec!["ann@x.com".to_string()]);
        assert_eq!(mail.subject, config.subject);
        assert!(mail.text.contains("Hi Ann <Lee>,"));
        assert!(mail.text.contains("Role: Attendee"));
        assert!(mail.html.contains("Ann &lt;Lee&gt;"));
        assert!(!mail.html.contains("<Lee>"));
    }

    #[test]
    fn test_mailer_requires_key() {
        let mut config = MailConfig::default();
        assert!(ApiMailer::from_config(&config).is_none());

        config.api_key = Some("re_123".to_string());
        assert!(ApiMailer::from_config(&config).is_some());

        config.enabled = false;
        assert!(ApiMailer::from_config(&config).is_none());
    }

    #[test]
    fn test_payload_shape() {
        let mail = confirmation_mail(&MailConfig::default(), &submission());
        let json = serde_json::to_value(&mail).unwrap();
        for key in ["from", "to", "subject", "html", "text"] {
            assert!(json.get(key).is_some(), "{key}");
        }
    }
}
