//! Registered application domain model
//!
//! Apps are the remote consumers of SSO tokens. Access to an app is a flat
//! per-user allowlist, independent of the role lattice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered application that accepts SSO tokens
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct App {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            slug: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Reference to an app by id or slug, as supplied at token-obtain time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRef {
    Id(Uuid),
    Slug(String),
}
