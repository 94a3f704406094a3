//! Email service for invitation mail.
//!
//! Supports two providers:
//! - `console`: Logs emails (development)
//! - `sendgrid`: Uses the SendGrid API

use crate::config::EmailConfig;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Details rendered into an invitation email.
#[derive(Debug, Clone)]
pub struct InvitationEmail {
    pub to: String,
    pub group_name: String,
    pub role: String,
    pub message: Option<String>,
    pub token: String,
}

/// Email service for transactional mail.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message. A disabled service succeeds without sending.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Send the invitation link for a group.
    pub async fn send_invitation_email(&self, invitation: InvitationEmail) -> Result<(), EmailError> {
        let message = render_invitation(&self.config.base_url, &invitation);
        self.send(message).await
    }

    async fn send_console(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            to_name = ?message.to_name,
            subject = %message.subject,
            from = %self.config.sender_email,
            "Email (console provider)"
        );
        debug!(body_text = %message.body_text, "Email body");
        Ok(())
    }

    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let body = sendgrid_body(&self.config, &message);
        let response = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

fn render_invitation(base_url: &str, invitation: &InvitationEmail) -> EmailMessage {
    let url = format!("{}/invitations?token={}", base_url, invitation.token);
    let note = invitation
        .message
        .as_deref()
        .map(|m| format!("\n\"{}\"\n", m))
        .unwrap_or_default();

    let body_text = format!(
        r#"Hi,

You have been invited to join {group} as {role}.
{note}
Open the link below to accept or decline:

{url}

This invitation expires in 14 days.

The Chama Team"#,
        group = invitation.group_name,
        role = invitation.role,
        note = note,
        url = url,
    );

    let body_html = format!(
        r#"<p>Hi,</p>
<p>You have been invited to join <strong>{group}</strong> as {role}.</p>
<p><a href="{url}">Accept or decline the invitation</a></p>
<p>This invitation expires in 14 days.</p>"#,
        group = invitation.group_name,
        role = invitation.role,
        url = url,
    );

    EmailMessage {
        to: invitation.to.clone(),
        to_name: None,
        subject: format!("You're invited to join {}", invitation.group_name),
        body_text,
        body_html: Some(body_html),
    }
}

fn sendgrid_body(config: &EmailConfig, message: &EmailMessage) -> serde_json::Value {
    let mut to = serde_json::json!({ "email": message.to });
    if let Some(name) = &message.to_name {
        to["name"] = serde_json::json!(name);
    }

    let mut content = vec![serde_json::json!({
        "type": "text/plain",
        "value": message.body_text,
    })];
    if let Some(html) = &message.body_html {
        content.push(serde_json::json!({ "type": "text/html", "value": html }));
    }

    serde_json::json!({
        "personalizations": [{ "to": [to] }],
        "from": {
            "email": config.sender_email,
            "name": config.sender_name,
        },
        "subject": message.subject,
        "content": content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            provider: "console".to_string(),
            sendgrid_api_key: String::new(),
            sender_email: "test@example.com".to_string(),
            sender_name: "Test".to_string(),
            base_url: "https://app.example.com".to_string(),
        }
    }

    fn invitation() -> InvitationEmail {
        InvitationEmail {
            to: "member@example.com".into(),
            group_name: "Umoja Savers".into(),
            role: "member".into(),
            message: Some("Join us".into()),
            token: "abc123".into(),
        }
    }

    #[test]
    fn test_email_service_disabled() {
        let mut config = test_config();
        config.enabled = false;
        assert!(!EmailService::new(config).is_enabled());
    }

    #[tokio::test]
    async fn test_send_console_email() {
        let service = EmailService::new(test_config());
        assert!(service.send_invitation_email(invitation()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_disabled_silently_succeeds() {
        let mut config = test_config();
        config.enabled = false;
        config.provider = "sendgrid".into();
        let service = EmailService::new(config);
        assert!(service.send_invitation_email(invitation()).await.is_ok());
    }

    #[tokio::test]
    async fn test_sendgrid_without_key_is_not_configured() {
        let mut config = test_config();
        config.provider = "sendgrid".into();
        let service = EmailService::new(config);
        let result = service.send_invitation_email(invitation()).await;
        assert!(matches!(result, Err(EmailError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let mut config = test_config();
        config.provider = "pigeon".into();
        let result = EmailService::new(config)
            .send_invitation_email(invitation())
            .await;
        assert!(matches!(result, Err(EmailError::NotConfigured)));
    }

    #[test]
    fn test_invitation_rendering() {
        let message = render_invitation("https://app.example.com", &invitation());
        assert_eq!(message.subject, "You're invited to join Umoja Savers");
        assert!(message
            .body_text
            .contains("https://app.example.com/invitations?token=abc123"));
        assert!(message.body_text.contains("\"Join us\""));
        assert!(message.body_html.is_some());
    }

    #[test]
    fn test_sendgrid_body_shape() {
        let message = render_invitation("https://app.example.com", &invitation());
        let body = sendgrid_body(&test_config(), &message);
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "member@example.com");
        assert_eq!(body["content"].as_array().map(|c| c.len()), Some(2));
        assert_eq!(body["from"]["email"], "test@example.com");
    }
}
