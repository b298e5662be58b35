//! Outbound invitation notifications
//!
//! The Invitation Lifecycle talks to email through this port; delivery is
//! best-effort and never rolls back state. The SMTP implementation uses
//! lettre; tests substitute a mock.

use crate::domain::{Role, User};
use crate::config::EmailConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

/// Notification error types
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Role and scope context rendered into invitation emails
#[derive(Debug, Clone, Default)]
pub struct RoleInfo {
    pub role_label: String,
    pub property_name: Option<String>,
    pub property_group_name: Option<String>,
}

impl RoleInfo {
    pub fn for_role(role: Role) -> Self {
        Self {
            role_label: role.label().to_string(),
            ..Default::default()
        }
    }
}

/// Port for invitation email delivery
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvitationNotifier: Send + Sync {
    /// Send the initial invitation with its activation URL
    async fn send_invitation(
        &self,
        user: &User,
        invitation_url: &str,
        role_info: &RoleInfo,
    ) -> Result<(), NotifyError>;

    /// Re-send an invitation (fresh token, same template family)
    async fn send_resend(
        &self,
        user: &User,
        invitation_url: &str,
        role_info: &RoleInfo,
    ) -> Result<(), NotifyError>;
}

/// SMTP-backed notifier (lettre)
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    site_name: String,
    expiry_days: i64,
}

impl SmtpNotifier {
    pub fn from_config(
        config: &EmailConfig,
        site_name: &str,
        expiry_days: i64,
    ) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::InvalidConfiguration(e.to_string()))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
            site_name: site_name.to_string(),
            expiry_days,
        })
    }

    async fn send(&self, user: &User, subject: &str, body: String) -> Result<(), NotifyError> {
        let from: Mailbox = self
            .from_address
            .parse()
            .map_err(|e| NotifyError::InvalidConfiguration(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = user
            .email
            .parse()
            .map_err(|e| NotifyError::InvalidConfiguration(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::SendFailed(e.to_string()))
    }

    fn render_body(&self, user: &User, invitation_url: &str, role_info: &RoleInfo) -> String {
        let name = user.first_name.as_deref().unwrap_or("there");
        let mut body = format!(
            "Hi {},\n\nYou have been invited to join {} as {}.\n",
            name, self.site_name, role_info.role_label
        );
        if let Some(property) = &role_info.property_name {
            body.push_str(&format!("Property: {}\n", property));
        }
        if let Some(group) = &role_info.property_group_name {
            body.push_str(&format!("Property Group: {}\n", group));
        }
        body.push_str(&format!(
            "\nAccept Invitation: {}\n\nThis link expires in {} days.\n",
            invitation_url, self.expiry_days
        ));
        body
    }
}

#[async_trait]
impl InvitationNotifier for SmtpNotifier {
    async fn send_invitation(
        &self,
        user: &User,
        invitation_url: &str,
        role_info: &RoleInfo,
    ) -> Result<(), NotifyError> {
        let subject = format!("You're invited to join {}", self.site_name);
        let body = self.render_body(user, invitation_url, role_info);
        self.send(user, &subject, body).await
    }

    async fn send_resend(
        &self,
        user: &User,
        invitation_url: &str,
        role_info: &RoleInfo,
    ) -> Result<(), NotifyError> {
        let subject = format!("Reminder: your invitation to {}", self.site_name);
        let body = self.render_body(user, invitation_url, role_info);
        self.send(user, &subject, body).await
    }
}
