//! Invitation lifecycle service
//!
//! State machine per user: unsent -> sent -> accepted, with expiry derived
//! from the sent timestamp. Tokens are single-valid-per-user: issuing or
//! resending overwrites the previous one.

use crate::config::InvitationConfig;
use crate::domain::User;
use crate::email::{InvitationNotifier, RoleInfo};
use crate::error::{AppError, Result};
use crate::repository::UserRepository;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;

/// Terminal redemption errors, stable across the wire
pub const ERR_UNKNOWN_TOKEN: &str = "Invalid invitation token.";
pub const ERR_ALREADY_ACCEPTED: &str = "Invitation has already been accepted.";
pub const ERR_EXPIRED: &str = "Invitation has expired. Please request a new invitation.";

/// Service for the invitation lifecycle
pub struct InvitationService<UR, N>
where
    UR: UserRepository,
    N: InvitationNotifier,
{
    users: Arc<UR>,
    notifier: Arc<N>,
    config: InvitationConfig,
}

impl<UR, N> InvitationService<UR, N>
where
    UR: UserRepository,
    N: InvitationNotifier,
{
    pub fn new(users: Arc<UR>, notifier: Arc<N>, config: InvitationConfig) -> Self {
        Self {
            users,
            notifier,
            config,
        }
    }

    /// Issue an invitation: fresh token, sent markers, best-effort email.
    ///
    /// Does not activate the account; activation happens at redemption.
    pub async fn issue(&self, user: &User, role_info: &RoleInfo) -> Result<User> {
        let token = self.generate_token();
        let updated = self
            .users
            .mark_invitation_sent(user.id, &token, Utc::now())
            .await?;

        if let Err(e) = self
            .notifier
            .send_invitation(&updated, &self.invitation_url(&token), role_info)
            .await
        {
            tracing::error!(user = %updated.email, "Failed to send invitation email: {}", e);
        }

        Ok(updated)
    }

    /// Re-issue an invitation. The old token becomes invalid.
    pub async fn resend(&self, user: &User, role_info: &RoleInfo) -> Result<User> {
        if user.invitation_accepted {
            return Err(AppError::BadRequest(
                "This user has already accepted their invitation.".to_string(),
            ));
        }

        let token = self.generate_token();
        let updated = self
            .users
            .mark_invitation_sent(user.id, &token, Utc::now())
            .await?;

        if let Err(e) = self
            .notifier
            .send_resend(&updated, &self.invitation_url(&token), role_info)
            .await
        {
            tracing::error!(user = %updated.email, "Failed to resend invitation email: {}", e);
        }

        Ok(updated)
    }

    /// Redeem a token, activating the account.
    ///
    /// Preconditions, in order: the token must exist, must not already be
    /// accepted, and must not be expired. Each failure is terminal for that
    /// token with a distinct stable message; resend is the only recovery.
    /// The token is retained after acceptance; the accepted flag makes
    /// replay a no-op.
    pub async fn redeem(&self, token: &str) -> Result<User> {
        let user = self
            .users
            .find_by_invitation_token(token)
            .await?
            .ok_or_else(|| AppError::BadRequest(ERR_UNKNOWN_TOKEN.to_string()))?;

        if user.invitation_accepted {
            return Err(AppError::BadRequest(ERR_ALREADY_ACCEPTED.to_string()));
        }

        if let Some(sent_at) = user.invitation_sent_at {
            if Utc::now() - sent_at > Duration::days(self.config.expiry_days) {
                return Err(AppError::BadRequest(ERR_EXPIRED.to_string()));
            }
        }

        let activated = self
            .users
            .mark_invitation_accepted(user.id, Utc::now())
            .await?;

        tracing::info!(user = %activated.email, "Invitation accepted");

        Ok(activated)
    }

    /// The activation URL embedded in the email
    fn invitation_url(&self, token: &str) -> String {
        format!(
            "{}/accept-invitation/{}",
            self.config.site_url.trim_end_matches('/'),
            token
        )
    }

    /// Generate an unpredictable single-use token from OS entropy.
    ///
    /// Deliberately independent of email or timestamps.
    fn generate_token(&self) -> String {
        let mut token_bytes = [0u8; 32];
        rand::thread_rng().fill(&mut token_bytes);
        URL_SAFE_NO_PAD.encode(token_bytes)
    }
}
