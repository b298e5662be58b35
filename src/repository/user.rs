//! User repository

use crate::domain::User;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a fully-formed user row
    async fn create(&self, user: &User) -> Result<User>;

    /// Find user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Find user by the exact stored invitation token
    async fn find_by_invitation_token(&self, token: &str) -> Result<Option<User>>;

    /// List every user (superuser listings)
    async fn list_all(&self) -> Result<Vec<User>>;

    /// List users by ID set (scoped listings)
    async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    /// Update profile fields
    async fn update_profile(
        &self,
        id: Uuid,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User>;

    /// Persist a freshly issued invitation token
    async fn mark_invitation_sent(
        &self,
        id: Uuid,
        token: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<User>;

    /// Mark the invitation accepted and activate the account
    async fn mark_invitation_accepted(&self, id: Uuid, accepted_at: DateTime<Utc>)
        -> Result<User>;

    /// Flip the active flag
    async fn set_active(&self, id: Uuid, active: bool) -> Result<User>;

    /// Hard-delete a user and their memberships
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Total user count
    async fn count(&self) -> Result<i64>;

    /// Active user count
    async fn count_active(&self) -> Result<i64>;

    /// Superusers plus holders of any admin-role membership
    async fn count_admins(&self) -> Result<i64>;

    /// Holders of at least one tenant membership
    async fn count_tenants(&self) -> Result<i64>;
}

pub struct UserRepositoryImpl {
    pool: MySqlPool,
}

impl UserRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, password_hash, is_staff, \
     is_superuser, is_active, invitation_sent, invitation_accepted, invitation_token, \
     invitation_sent_at, invitation_accepted_at, created_at, updated_at";

#[async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn create(&self, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, password_hash, is_staff,
                is_superuser, is_active, invitation_sent, invitation_accepted, invitation_token,
                invitation_sent_at, invitation_accepted_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.is_active)
        .bind(user.invitation_sent)
        .bind(user.invitation_accepted)
        .bind(&user.invitation_token)
        .bind(user.invitation_sent_at)
        .bind(user.invitation_accepted_at)
        .execute(&self.pool)
        .await?;

        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create user")))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_invitation_token(&self, token: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE invitation_token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id IN ({placeholders}) ORDER BY created_at DESC"
        );

        let mut q = sqlx::query_as::<_, User>(&query);
        for id in ids {
            q = q.bind(id);
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn mark_invitation_sent(
        &self,
        id: Uuid,
        token: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET invitation_sent = TRUE, invitation_token = ?, invitation_sent_at = ?,
                updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(token)
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn mark_invitation_accepted(
        &self,
        id: Uuid,
        accepted_at: DateTime<Utc>,
    ) -> Result<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET invitation_accepted = TRUE, invitation_accepted_at = ?, is_active = TRUE,
                updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(accepted_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<User> {
        sqlx::query("UPDATE users SET is_active = ?, updated_at = NOW() WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM memberships WHERE user_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_active(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_admins(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT u.id)
            FROM users u
            LEFT JOIN memberships m ON m.user_id = u.id
            WHERE u.is_superuser = TRUE OR m.role IN ('property_admin', 'group_admin')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_tenants(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT u.id)
            FROM users u
            JOIN memberships m ON m.user_id = u.id
            WHERE m.role = 'tenant'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
