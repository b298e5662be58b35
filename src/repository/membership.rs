//! Membership repository

use crate::domain::Membership;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

const MEMBERSHIP_COLUMNS: &str =
    "id, user_id, property_id, property_group_id, role, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert a membership row
    async fn create(&self, membership: &Membership) -> Result<Membership>;

    /// All memberships held by a user
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Membership>>;

    /// All memberships scoped directly to a property
    async fn list_by_property(&self, property_id: Uuid) -> Result<Vec<Membership>>;

    /// All memberships scoped directly to a property group
    async fn list_by_group(&self, group_id: Uuid) -> Result<Vec<Membership>>;

    /// Whether a (user, property, group) triple already exists
    async fn exists(
        &self,
        user_id: Uuid,
        property_id: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> Result<bool>;

    /// Remove all memberships of a user (role reassignment, user deletion)
    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64>;
}

pub struct MembershipRepositoryImpl {
    pool: MySqlPool,
}

impl MembershipRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for MembershipRepositoryImpl {
    async fn create(&self, membership: &Membership) -> Result<Membership> {
        membership.validate().map_err(AppError::Validation)?;

        sqlx::query(
            r#"
            INSERT INTO memberships (id, user_id, property_id, property_group_id, role, created_at)
            VALUES (?, ?, ?, ?, ?, NOW())
            "#,
        )
        .bind(membership.id)
        .bind(membership.user_id)
        .bind(membership.property_id)
        .bind(membership.property_group_id)
        .bind(membership.role)
        .execute(&self.pool)
        .await?;

        let created = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = ?"
        ))
        .bind(membership.id)
        .fetch_optional(&self.pool)
        .await?;

        created.ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create membership")))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ? ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    async fn list_by_property(&self, property_id: Uuid) -> Result<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE property_id = ?"
        ))
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    async fn list_by_group(&self, group_id: Uuid) -> Result<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE property_group_id = ?"
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    async fn exists(
        &self,
        user_id: Uuid,
        property_id: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM memberships
            WHERE user_id = ? AND property_id <=> ? AND property_group_id <=> ?
            "#,
        )
        .bind(user_id)
        .bind(property_id)
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM memberships WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
