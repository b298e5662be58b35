//! Property and property-group repository

use crate::domain::{Property, PropertyGroup};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

const PROPERTY_COLUMNS: &str =
    "id, property_group_id, name, subdomain, created_at, updated_at";
const GROUP_COLUMNS: &str = "id, name, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    /// Insert a property group
    async fn create_group(&self, group: &PropertyGroup) -> Result<PropertyGroup>;

    /// Insert a property
    async fn create_property(&self, property: &Property) -> Result<Property>;

    /// Find a property by ID
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>>;

    /// Find a group by ID
    async fn find_group(&self, id: Uuid) -> Result<Option<PropertyGroup>>;

    /// All properties contained in a group
    async fn properties_in_group(&self, group_id: Uuid) -> Result<Vec<Property>>;

    /// The group owning a property, if any
    async fn group_of(&self, property_id: Uuid) -> Result<Option<PropertyGroup>>;

    /// Every property
    async fn list_properties(&self) -> Result<Vec<Property>>;

    /// Every group
    async fn list_groups(&self) -> Result<Vec<PropertyGroup>>;

    /// Delete a group and the properties it contains
    async fn delete_group(&self, id: Uuid) -> Result<()>;
}

pub struct PropertyRepositoryImpl {
    pool: MySqlPool,
}

impl PropertyRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PropertyRepository for PropertyRepositoryImpl {
    async fn create_group(&self, group: &PropertyGroup) -> Result<PropertyGroup> {
        sqlx::query(
            "INSERT INTO property_groups (id, name, created_at, updated_at) VALUES (?, ?, NOW(), NOW())",
        )
        .bind(group.id)
        .bind(&group.name)
        .execute(&self.pool)
        .await?;

        self.find_group(group.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create property group")))
    }

    async fn create_property(&self, property: &Property) -> Result<Property> {
        sqlx::query(
            r#"
            INSERT INTO properties (id, property_group_id, name, subdomain, created_at, updated_at)
            VALUES (?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(property.id)
        .bind(property.property_group_id)
        .bind(&property.name)
        .bind(&property.subdomain)
        .execute(&self.pool)
        .await?;

        self.find_property(property.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create property")))
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<Property>> {
        let property = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(property)
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<PropertyGroup>> {
        let group = sqlx::query_as::<_, PropertyGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM property_groups WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn properties_in_group(&self, group_id: Uuid) -> Result<Vec<Property>> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE property_group_id = ? ORDER BY name"
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(properties)
    }

    async fn group_of(&self, property_id: Uuid) -> Result<Option<PropertyGroup>> {
        let group = sqlx::query_as::<_, PropertyGroup>(
            r#"
            SELECT g.id, g.name, g.created_at, g.updated_at
            FROM property_groups g
            JOIN properties p ON p.property_group_id = g.id
            WHERE p.id = ?
            "#,
        )
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn list_properties(&self) -> Result<Vec<Property>> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(properties)
    }

    async fn list_groups(&self) -> Result<Vec<PropertyGroup>> {
        let groups = sqlx::query_as::<_, PropertyGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM property_groups ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn delete_group(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM properties WHERE property_group_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM property_groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
