//! Registered-app repository

use crate::domain::App;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppRepository: Send + Sync {
    /// Find an active app by ID
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<App>>;

    /// Find an active app by slug
    async fn find_active_by_slug(&self, slug: &str) -> Result<Option<App>>;

    /// Whether the user is on the app's access list
    async fn user_has_access(&self, user_id: Uuid, app_id: Uuid) -> Result<bool>;

    /// Put a user on the app's access list
    async fn grant_access(&self, user_id: Uuid, app_id: Uuid) -> Result<()>;
}

pub struct AppRepositoryImpl {
    pool: MySqlPool,
}

impl AppRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppRepository for AppRepositoryImpl {
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<App>> {
        let app = sqlx::query_as::<_, App>(
            "SELECT id, name, slug, is_active, created_at FROM apps WHERE id = ? AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(app)
    }

    async fn find_active_by_slug(&self, slug: &str) -> Result<Option<App>> {
        let app = sqlx::query_as::<_, App>(
            "SELECT id, name, slug, is_active, created_at FROM apps WHERE slug = ? AND is_active = TRUE",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(app)
    }

    async fn user_has_access(&self, user_id: Uuid, app_id: Uuid) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM app_access WHERE user_id = ? AND app_id = ?",
        )
        .bind(user_id)
        .bind(app_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn grant_access(&self, user_id: Uuid, app_id: Uuid) -> Result<()> {
        sqlx::query("INSERT IGNORE INTO app_access (user_id, app_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(app_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
