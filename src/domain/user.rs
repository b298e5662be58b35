//! User domain model

use super::{MembershipInfo, Role};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// User entity
///
/// New accounts start inactive; activation happens through invitation
/// acceptance (or a superuser override). Superusers are created active and
/// never hold memberships.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub invitation_sent: bool,
    pub invitation_accepted: bool,
    #[serde(skip_serializing)]
    pub invitation_token: Option<String>,
    pub invitation_sent_at: Option<DateTime<Utc>>,
    pub invitation_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            first_name: None,
            last_name: None,
            password_hash: String::new(),
            is_staff: false,
            is_superuser: false,
            is_active: false,
            invitation_sent: false,
            invitation_accepted: false,
            invitation_token: None,
            invitation_sent_at: None,
            invitation_accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Invitation lifecycle state, derived from the stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationState {
    Unsent,
    Sent,
    Accepted,
    /// Sent, never accepted, and past the expiry window. Not stored;
    /// computed from `invitation_sent_at`.
    Expired,
}

impl User {
    /// Derive the invitation state as of `now` with the given expiry window.
    pub fn invitation_state(&self, now: DateTime<Utc>, expiry_days: i64) -> InvitationState {
        if self.invitation_accepted {
            return InvitationState::Accepted;
        }
        match self.invitation_sent_at {
            Some(sent_at) if now - sent_at > Duration::days(expiry_days) => {
                InvitationState::Expired
            }
            Some(_) => InvitationState::Sent,
            None if self.invitation_sent => InvitationState::Sent,
            None => InvitationState::Unsent,
        }
    }
}

/// Input for creating a managed user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 254))]
    pub first_name: Option<String>,
    #[validate(length(max = 254))]
    pub last_name: Option<String>,
    pub role: Role,
    pub property_id: Option<Uuid>,
    pub property_group_id: Option<Uuid>,
}

/// Input for updating profile fields
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(max = 254))]
    pub first_name: Option<String>,
    #[validate(length(max = 254))]
    pub last_name: Option<String>,
}

/// Input for reassigning a user's role and scope
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleInput {
    pub role: Role,
    pub property_id: Option<Uuid>,
    pub property_group_id: Option<Uuid>,
}

/// User rendered for management listings (never exposes the token or hash)
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub invitation_sent: bool,
    pub invitation_accepted: bool,
    /// Primary role: highest-rank membership, or `super_user` for superusers
    pub role: Option<Role>,
    pub memberships: Vec<MembershipInfo>,
}

impl UserResponse {
    pub fn new(user: &User, memberships: Vec<MembershipInfo>) -> Self {
        let role = if user.is_superuser {
            Some(Role::SuperUser)
        } else {
            memberships.iter().map(|m| m.role).max()
        };
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            invitation_sent: user.invitation_sent,
            invitation_accepted: user.invitation_accepted,
            role,
            memberships,
        }
    }
}

/// Console statistics over the user table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    /// Superusers plus holders of any admin-role membership
    pub admin_users: i64,
    /// Holders of at least one tenant membership
    pub tenants: i64,
}
