//! Membership domain model
//!
//! A membership ties a user to exactly one scope (a property or a property
//! group) with one role. The XOR rule is enforced at validation time.

use super::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The scope a membership (or a permission check) is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipScope {
    Property(Uuid),
    PropertyGroup(Uuid),
}

/// User-to-scope role assignment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Option<Uuid>,
    pub property_group_id: Option<Uuid>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    /// The single scope of this membership, if the row is well-formed.
    pub fn scope(&self) -> Option<MembershipScope> {
        match (self.property_id, self.property_group_id) {
            (Some(property_id), None) => Some(MembershipScope::Property(property_id)),
            (None, Some(group_id)) => Some(MembershipScope::PropertyGroup(group_id)),
            _ => None,
        }
    }

    /// Enforce the scope XOR rule and the membership-role restriction.
    pub fn validate(&self) -> Result<(), String> {
        if !self.role.is_membership_role() {
            return Err("super_user is a user attribute, not a membership role".to_string());
        }
        match (self.property_id, self.property_group_id) {
            (None, None) => Err(
                "A membership must be linked to either a property or a property group".to_string(),
            ),
            (Some(_), Some(_)) => Err(
                "A membership cannot be linked to both a property and a property group".to_string(),
            ),
            _ => Ok(()),
        }
    }
}

impl Default for Membership {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            property_id: None,
            property_group_id: None,
            role: Role::Tenant,
            created_at: Utc::now(),
        }
    }
}

/// Membership rendered for API responses and token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipInfo {
    pub role: Role,
    /// Only set for the superuser's synthetic "global" entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_group_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_group_name: Option<String>,
}
