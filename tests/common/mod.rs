//! Common test utilities: in-memory repositories and a wired fixture.
//!
//! The repository traits are implemented over hash maps so the whole stack
//! (services, resolver, decider, router) runs without a database.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tenancy_core::config::{InvitationConfig, JwtConfig};
use tenancy_core::domain::{App, Membership, Property, PropertyGroup, Role, User};
use tenancy_core::email::{InvitationNotifier, NotifyError, RoleInfo};
use tenancy_core::error::{AppError, Result};
use tenancy_core::jwt::JwtManager;
use tenancy_core::permission::PermissionDecider;
use tenancy_core::repository::{
    AppRepository, MembershipRepository, PropertyRepository, UserRepository,
};
use tenancy_core::scope::{CampaignDirectory, CampaignRef, ScopeResolver};
use tenancy_core::service::{InvitationService, SsoService, UserService};
use tenancy_core::state::{HasInvitations, HasSso};
use uuid::Uuid;

// ============================================================================
// In-memory repositories
// ============================================================================

#[derive(Default)]
pub struct InMemoryMemberships {
    rows: RwLock<HashMap<Uuid, Membership>>,
}

#[async_trait]
impl MembershipRepository for InMemoryMemberships {
    async fn create(&self, membership: &Membership) -> Result<Membership> {
        membership.validate().map_err(AppError::Validation)?;
        self.rows
            .write()
            .unwrap()
            .insert(membership.id, membership.clone());
        Ok(membership.clone())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Membership>> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_property(&self, property_id: Uuid) -> Result<Vec<Membership>> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|m| m.property_id == Some(property_id))
            .cloned()
            .collect())
    }

    async fn list_by_group(&self, group_id: Uuid) -> Result<Vec<Membership>> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|m| m.property_group_id == Some(group_id))
            .cloned()
            .collect())
    }

    async fn exists(
        &self,
        user_id: Uuid,
        property_id: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self.rows.read().unwrap().values().any(|m| {
            m.user_id == user_id
                && m.property_id == property_id
                && m.property_group_id == group_id
        }))
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|_, m| m.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }
}

pub struct InMemoryUsers {
    rows: RwLock<HashMap<Uuid, User>>,
    memberships: Arc<InMemoryMemberships>,
}

impl InMemoryUsers {
    pub fn new(memberships: Arc<InMemoryMemberships>) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            memberships,
        }
    }

    /// Rewind an invitation's sent timestamp (expiry scenarios)
    pub fn backdate_invitation(&self, id: Uuid, sent_at: DateTime<Utc>) {
        if let Some(user) = self.rows.write().unwrap().get_mut(&id) {
            user.invitation_sent_at = Some(sent_at);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.rows.read().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn create(&self, user: &User) -> Result<User> {
        self.rows.write().unwrap().insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.rows.read().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_invitation_token(&self, token: &str) -> Result<Option<User>> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .find(|u| u.invitation_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.rows.read().unwrap().values().cloned().collect())
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let rows = self.rows.read().unwrap();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User> {
        let mut rows = self.rows.write().unwrap();
        let user = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        if first_name.is_some() {
            user.first_name = first_name;
        }
        if last_name.is_some() {
            user.last_name = last_name;
        }
        Ok(user.clone())
    }

    async fn mark_invitation_sent(
        &self,
        id: Uuid,
        token: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<User> {
        let mut rows = self.rows.write().unwrap();
        let user = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        user.invitation_sent = true;
        user.invitation_token = Some(token.to_string());
        user.invitation_sent_at = Some(sent_at);
        Ok(user.clone())
    }

    async fn mark_invitation_accepted(
        &self,
        id: Uuid,
        accepted_at: DateTime<Utc>,
    ) -> Result<User> {
        let mut rows = self.rows.write().unwrap();
        let user = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        user.invitation_accepted = true;
        user.invitation_accepted_at = Some(accepted_at);
        user.is_active = true;
        Ok(user.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<User> {
        let mut rows = self.rows.write().unwrap();
        let user = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        user.is_active = active;
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.rows.write().unwrap().remove(&id);
        self.memberships.delete_by_user(id).await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.read().unwrap().len() as i64)
    }

    async fn count_active(&self) -> Result<i64> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|u| u.is_active)
            .count() as i64)
    }

    async fn count_admins(&self) -> Result<i64> {
        let users: Vec<User> = self.rows.read().unwrap().values().cloned().collect();
        let mut count = 0;
        for user in users {
            if user.is_superuser {
                count += 1;
                continue;
            }
            let memberships = self.memberships.list_by_user(user.id).await?;
            if memberships.iter().any(|m| m.role.is_admin()) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_tenants(&self) -> Result<i64> {
        let users: Vec<User> = self.rows.read().unwrap().values().cloned().collect();
        let mut count = 0;
        for user in users {
            let memberships = self.memberships.list_by_user(user.id).await?;
            if memberships.iter().any(|m| m.role == Role::Tenant) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[derive(Default)]
pub struct InMemoryProperties {
    groups: RwLock<HashMap<Uuid, PropertyGroup>>,
    properties: RwLock<HashMap<Uuid, Property>>,
}

impl InMemoryProperties {
    /// Reassign a property to another group (scope-recomputation scenarios)
    pub fn move_property(&self, property_id: Uuid, group_id: Option<Uuid>) {
        if let Some(property) = self.properties.write().unwrap().get_mut(&property_id) {
            property.property_group_id = group_id;
        }
    }
}

#[async_trait]
impl PropertyRepository for InMemoryProperties {
    async fn create_group(&self, group: &PropertyGroup) -> Result<PropertyGroup> {
        self.groups.write().unwrap().insert(group.id, group.clone());
        Ok(group.clone())
    }

    async fn create_property(&self, property: &Property) -> Result<Property> {
        self.properties
            .write()
            .unwrap()
            .insert(property.id, property.clone());
        Ok(property.clone())
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<Property>> {
        Ok(self.properties.read().unwrap().get(&id).cloned())
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<PropertyGroup>> {
        Ok(self.groups.read().unwrap().get(&id).cloned())
    }

    async fn properties_in_group(&self, group_id: Uuid) -> Result<Vec<Property>> {
        Ok(self
            .properties
            .read()
            .unwrap()
            .values()
            .filter(|p| p.property_group_id == Some(group_id))
            .cloned()
            .collect())
    }

    async fn group_of(&self, property_id: Uuid) -> Result<Option<PropertyGroup>> {
        let group_id = self
            .properties
            .read()
            .unwrap()
            .get(&property_id)
            .and_then(|p| p.property_group_id);
        Ok(match group_id {
            Some(id) => self.groups.read().unwrap().get(&id).cloned(),
            None => None,
        })
    }

    async fn list_properties(&self) -> Result<Vec<Property>> {
        Ok(self.properties.read().unwrap().values().cloned().collect())
    }

    async fn list_groups(&self) -> Result<Vec<PropertyGroup>> {
        Ok(self.groups.read().unwrap().values().cloned().collect())
    }

    async fn delete_group(&self, id: Uuid) -> Result<()> {
        self.properties
            .write()
            .unwrap()
            .retain(|_, p| p.property_group_id != Some(id));
        self.groups.write().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryApps {
    apps: RwLock<HashMap<Uuid, App>>,
    access: RwLock<Vec<(Uuid, Uuid)>>,
}

impl InMemoryApps {
    pub fn insert(&self, app: App) {
        self.apps.write().unwrap().insert(app.id, app);
    }

    pub fn deactivate(&self, app_id: Uuid) {
        if let Some(app) = self.apps.write().unwrap().get_mut(&app_id) {
            app.is_active = false;
        }
    }
}

#[async_trait]
impl AppRepository for InMemoryApps {
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<App>> {
        Ok(self
            .apps
            .read()
            .unwrap()
            .get(&id)
            .filter(|a| a.is_active)
            .cloned())
    }

    async fn find_active_by_slug(&self, slug: &str) -> Result<Option<App>> {
        Ok(self
            .apps
            .read()
            .unwrap()
            .values()
            .find(|a| a.slug == slug && a.is_active)
            .cloned())
    }

    async fn user_has_access(&self, user_id: Uuid, app_id: Uuid) -> Result<bool> {
        Ok(self
            .access
            .read()
            .unwrap()
            .contains(&(user_id, app_id)))
    }

    async fn grant_access(&self, user_id: Uuid, app_id: Uuid) -> Result<()> {
        let mut access = self.access.write().unwrap();
        if !access.contains(&(user_id, app_id)) {
            access.push((user_id, app_id));
        }
        Ok(())
    }
}

/// Notifier that records deliveries instead of sending them
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentEmail>>,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub url: String,
    pub role_label: String,
    pub resend: bool,
}

#[async_trait]
impl InvitationNotifier for RecordingNotifier {
    async fn send_invitation(
        &self,
        user: &User,
        invitation_url: &str,
        role_info: &RoleInfo,
    ) -> std::result::Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: user.email.clone(),
            url: invitation_url.to_string(),
            role_label: role_info.role_label.clone(),
            resend: false,
        });
        Ok(())
    }

    async fn send_resend(
        &self,
        user: &User,
        invitation_url: &str,
        role_info: &RoleInfo,
    ) -> std::result::Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: user.email.clone(),
            url: invitation_url.to_string(),
            role_label: role_info.role_label.clone(),
            resend: true,
        });
        Ok(())
    }
}

/// Fixed campaign universe standing in for the campaign collaborator
pub struct StaticCampaigns(pub Vec<CampaignRef>);

#[async_trait]
impl CampaignDirectory for StaticCampaigns {
    async fn list_all(&self) -> Result<Vec<CampaignRef>> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Wired fixture
// ============================================================================

pub type TestUserService =
    UserService<InMemoryUsers, InMemoryMemberships, InMemoryProperties, RecordingNotifier>;
pub type TestInvitationService = InvitationService<InMemoryUsers, RecordingNotifier>;
pub type TestSsoService =
    SsoService<InMemoryUsers, InMemoryMemberships, InMemoryProperties, InMemoryApps>;

pub struct TestEnv {
    pub users: Arc<InMemoryUsers>,
    pub memberships: Arc<InMemoryMemberships>,
    pub properties: Arc<InMemoryProperties>,
    pub apps: Arc<InMemoryApps>,
    pub notifier: Arc<RecordingNotifier>,
    pub user_service: Arc<TestUserService>,
    pub invitation_service: Arc<TestInvitationService>,
    pub sso_service: Arc<TestSsoService>,
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-key-for-testing-purposes-only".to_string(),
        issuer: "tenancy-core".to_string(),
        access_token_ttl_secs: 3600,
        refresh_token_ttl_secs: 604800,
        private_key_pem: None,
        public_key_pem: None,
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let memberships = Arc::new(InMemoryMemberships::default());
        let users = Arc::new(InMemoryUsers::new(memberships.clone()));
        let properties = Arc::new(InMemoryProperties::default());
        let apps = Arc::new(InMemoryApps::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let invitation_service = Arc::new(InvitationService::new(
            users.clone(),
            notifier.clone(),
            InvitationConfig::default(),
        ));
        let user_service = Arc::new(UserService::new(
            users.clone(),
            memberships.clone(),
            properties.clone(),
            invitation_service.clone(),
        ));
        let sso_service = Arc::new(SsoService::new(
            users.clone(),
            memberships.clone(),
            properties.clone(),
            apps.clone(),
            JwtManager::new(jwt_config()),
        ));

        Self {
            users,
            memberships,
            properties,
            apps,
            notifier,
            user_service,
            invitation_service,
            sso_service,
        }
    }

    pub fn resolver(&self) -> ScopeResolver<InMemoryMemberships, InMemoryProperties> {
        ScopeResolver::new(self.memberships.clone(), self.properties.clone())
    }

    pub fn decider(&self) -> PermissionDecider<InMemoryMemberships, InMemoryProperties> {
        PermissionDecider::new(self.memberships.clone(), self.properties.clone())
    }

    pub fn router(&self) -> axum::Router {
        tenancy_core::api::routes(TestState {
            invitations: self.invitation_service.clone(),
            sso: self.sso_service.clone(),
        })
    }

    pub async fn create_group(&self, name: &str) -> PropertyGroup {
        let group = PropertyGroup {
            name: name.to_string(),
            ..Default::default()
        };
        self.properties.create_group(&group).await.unwrap()
    }

    pub async fn create_property(&self, name: &str, group: Option<&PropertyGroup>) -> Property {
        let property = Property {
            name: name.to_string(),
            property_group_id: group.map(|g| g.id),
            subdomain: None,
            ..Default::default()
        };
        self.properties.create_property(&property).await.unwrap()
    }

    pub async fn seed_superuser(&self, email: &str) -> User {
        let user = User {
            email: email.to_string(),
            password_hash: tenancy_core::crypto::hash_password("testpass123").unwrap(),
            is_staff: true,
            is_superuser: true,
            is_active: true,
            invitation_accepted: true,
            ..Default::default()
        };
        self.users.create(&user).await.unwrap()
    }

    /// Insert an already-activated user holding one membership.
    pub async fn seed_member(
        &self,
        email: &str,
        role: Role,
        property: Option<&Property>,
        group: Option<&PropertyGroup>,
    ) -> User {
        let user = User {
            email: email.to_string(),
            password_hash: tenancy_core::crypto::hash_password("testpass123").unwrap(),
            is_staff: role.is_admin(),
            is_active: true,
            invitation_sent: true,
            invitation_accepted: true,
            ..Default::default()
        };
        let user = self.users.create(&user).await.unwrap();
        self.memberships
            .create(&Membership {
                user_id: user.id,
                property_id: property.map(|p| p.id),
                property_group_id: group.map(|g| g.id),
                role,
                ..Default::default()
            })
            .await
            .unwrap();
        user
    }

    /// Add an extra membership to an existing user.
    pub async fn add_membership(
        &self,
        user: &User,
        role: Role,
        property: Option<&Property>,
        group: Option<&PropertyGroup>,
    ) {
        self.memberships
            .create(&Membership {
                user_id: user.id,
                property_id: property.map(|p| p.id),
                property_group_id: group.map(|g| g.id),
                role,
                ..Default::default()
            })
            .await
            .unwrap();
    }
}

#[derive(Clone)]
pub struct TestState {
    invitations: Arc<TestInvitationService>,
    sso: Arc<TestSsoService>,
}

impl HasInvitations for TestState {
    type UserRepo = InMemoryUsers;
    type Notifier = RecordingNotifier;

    fn invitation_service(&self) -> &TestInvitationService {
        &self.invitations
    }
}

impl HasSso for TestState {
    type UserRepo = InMemoryUsers;
    type MembershipRepo = InMemoryMemberships;
    type PropertyRepo = InMemoryProperties;
    type AppRepo = InMemoryApps;

    fn sso_service(&self) -> &TestSsoService {
        &self.sso
    }
}
