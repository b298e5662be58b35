//! Property and property-group domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A logical grouping of properties (e.g., "Shopping Centers")
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PropertyGroup {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PropertyGroup {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An individual property, optionally contained in a group
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: Uuid,
    pub property_group_id: Option<Uuid>,
    pub name: String,
    pub subdomain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Property {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            property_group_id: None,
            name: String::new(),
            subdomain: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a property group
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePropertyGroupInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Input for creating a property
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePropertyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub property_group_id: Option<Uuid>,
    #[validate(
        length(min = 1, max = 100),
        custom(function = "validate_subdomain")
    )]
    pub subdomain: Option<String>,
}

/// Validate subdomain format (lowercase letters, numbers, and hyphens)
fn validate_subdomain(subdomain: &str) -> Result<(), validator::ValidationError> {
    if SUBDOMAIN_REGEX.is_match(subdomain) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_subdomain"))
    }
}

lazy_static::lazy_static! {
    pub static ref SUBDOMAIN_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z0-9-]+$").unwrap();
}

/// Property rendered with its owning group (for console listings)
#[derive(Debug, Clone, Serialize)]
pub struct PropertyWithGroup {
    pub id: Uuid,
    pub name: String,
    pub property_group: Option<GroupRef>,
}

/// Compact group reference
#[derive(Debug, Clone, Serialize)]
pub struct GroupRef {
    pub id: Uuid,
    pub name: String,
}

impl From<&PropertyGroup> for GroupRef {
    fn from(group: &PropertyGroup) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
        }
    }
}
