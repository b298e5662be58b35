//! User management service
//!
//! Every operation is gated by the Permission Decider before touching state.
//! Structural mistakes surface as validation errors; authority failures as
//! denials. New users are created inactive and invited; superusers are
//! created active with no memberships.

use crate::crypto;
use crate::domain::{
    AssignRoleInput, CreateUserInput, GroupRef, Membership, PropertyWithGroup, Role, User,
    UserResponse, UserStats,
};
use crate::email::{InvitationNotifier, RoleInfo};
use crate::error::{AppError, Result};
use crate::permission::{validate_role_scope, PermissionDecider};
use crate::repository::{MembershipRepository, PropertyRepository, UserRepository};
use crate::service::InvitationService;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Scopes the actor may manage, for console dropdowns
#[derive(Debug, Clone, Serialize)]
pub struct ManageableScopes {
    pub can_manage_all: bool,
    pub properties: Vec<PropertyWithGroup>,
    pub property_groups: Vec<GroupRef>,
}

/// Service for managing users under the tenancy hierarchy
pub struct UserService<UR, MR, PR, N>
where
    UR: UserRepository,
    MR: MembershipRepository,
    PR: PropertyRepository,
    N: InvitationNotifier,
{
    users: Arc<UR>,
    memberships: Arc<MR>,
    properties: Arc<PR>,
    decider: PermissionDecider<MR, PR>,
    invitations: Arc<InvitationService<UR, N>>,
}

impl<UR, MR, PR, N> UserService<UR, MR, PR, N>
where
    UR: UserRepository,
    MR: MembershipRepository,
    PR: PropertyRepository,
    N: InvitationNotifier,
{
    pub fn new(
        users: Arc<UR>,
        memberships: Arc<MR>,
        properties: Arc<PR>,
        invitations: Arc<InvitationService<UR, N>>,
    ) -> Self {
        let decider = PermissionDecider::new(memberships.clone(), properties.clone());
        Self {
            users,
            memberships,
            properties,
            decider,
            invitations,
        }
    }

    pub fn decider(&self) -> &PermissionDecider<MR, PR> {
        &self.decider
    }

    /// Create a user with a role, scoped membership, and invitation.
    pub async fn create_user(&self, actor: &User, input: CreateUserInput) -> Result<User> {
        input.validate()?;
        validate_role_scope(input.role, input.property_id, input.property_group_id)?;

        // Resolve the scope up front so a dangling reference reads as a
        // caller mistake, not a denial
        let mut role_info = RoleInfo::for_role(input.role);
        if let Some(property_id) = input.property_id {
            let property = self
                .properties
                .find_property(property_id)
                .await?
                .ok_or_else(|| AppError::Validation("Invalid property ID.".to_string()))?;
            role_info.property_name = Some(property.name.clone());
            if let Some(group_id) = property.property_group_id {
                if let Some(group) = self.properties.find_group(group_id).await? {
                    role_info.property_group_name = Some(group.name);
                }
            }
        }
        if let Some(group_id) = input.property_group_id {
            let group = self
                .properties
                .find_group(group_id)
                .await?
                .ok_or_else(|| AppError::Validation("Invalid property group ID.".to_string()))?;
            role_info.property_group_name = Some(group.name);
        }

        if !self
            .decider
            .can_assign_role(actor, input.role, input.property_id, input.property_group_id)
            .await?
        {
            return Err(AppError::Forbidden(format!(
                "You cannot create a user with role {}",
                input.role
            )));
        }

        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                input.email
            )));
        }

        let is_superuser = input.role == Role::SuperUser;
        let user = User {
            email: input.email.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            password_hash: crypto::hash_password(&input.password)?,
            is_staff: input.role.is_admin(),
            is_superuser,
            // active only after invitation acceptance; superusers skip the flow
            is_active: is_superuser,
            invitation_accepted: is_superuser,
            ..Default::default()
        };
        let created = self.users.create(&user).await?;

        if !is_superuser {
            let membership = Membership {
                user_id: created.id,
                property_id: input.property_id,
                property_group_id: input.property_group_id,
                role: input.role,
                ..Default::default()
            };
            self.memberships.create(&membership).await?;

            return self.invitations.issue(&created, &role_info).await;
        }

        tracing::info!(user = %created.email, role = %input.role, "User created");

        Ok(created)
    }

    /// Replace a user's membership with a new role and scope.
    pub async fn assign_role(
        &self,
        actor: &User,
        target_id: Uuid,
        input: AssignRoleInput,
    ) -> Result<User> {
        if input.role == Role::SuperUser {
            return Err(AppError::Validation(
                "super_user cannot be granted through role reassignment".to_string(),
            ));
        }
        validate_role_scope(input.role, input.property_id, input.property_group_id)?;

        let target = self.find_target(target_id).await?;

        if !self.decider.can_manage_user(actor, &target).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to manage this user.".to_string(),
            ));
        }
        if !self
            .decider
            .can_assign_role(actor, input.role, input.property_id, input.property_group_id)
            .await?
        {
            return Err(AppError::Forbidden(format!(
                "You cannot assign role {}",
                input.role
            )));
        }

        self.memberships.delete_by_user(target.id).await?;
        let membership = Membership {
            user_id: target.id,
            property_id: input.property_id,
            property_group_id: input.property_group_id,
            role: input.role,
            ..Default::default()
        };
        self.memberships.create(&membership).await?;

        Ok(target)
    }

    /// Grant an additional membership alongside the existing ones.
    ///
    /// Unlike [`assign_role`](Self::assign_role) this appends; the
    /// (user, property, group) triple must not already exist.
    pub async fn add_membership(
        &self,
        actor: &User,
        target_id: Uuid,
        input: AssignRoleInput,
    ) -> Result<Membership> {
        if input.role == Role::SuperUser {
            return Err(AppError::Validation(
                "super_user cannot be granted through role reassignment".to_string(),
            ));
        }
        validate_role_scope(input.role, input.property_id, input.property_group_id)?;

        let target = self.find_target(target_id).await?;

        if !self.decider.can_manage_user(actor, &target).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to manage this user.".to_string(),
            ));
        }
        if !self
            .decider
            .can_assign_role(actor, input.role, input.property_id, input.property_group_id)
            .await?
        {
            return Err(AppError::Forbidden(format!(
                "You cannot assign role {}",
                input.role
            )));
        }

        if self
            .memberships
            .exists(target.id, input.property_id, input.property_group_id)
            .await?
        {
            return Err(AppError::Conflict(
                "This user already holds a membership for this scope".to_string(),
            ));
        }

        self.memberships
            .create(&Membership {
                user_id: target.id,
                property_id: input.property_id,
                property_group_id: input.property_group_id,
                role: input.role,
                ..Default::default()
            })
            .await
    }

    /// Update the caller's own profile fields. Role and scope are not
    /// touchable through this path.
    pub async fn update_profile(
        &self,
        actor: &User,
        input: crate::domain::UpdateUserInput,
    ) -> Result<User> {
        input.validate()?;
        self.users
            .update_profile(actor.id, input.first_name, input.last_name)
            .await
    }

    /// Users the actor can manage, rendered with memberships.
    pub async fn list_users(&self, actor: &User) -> Result<Vec<UserResponse>> {
        if !self.decider.can_view_management_console(actor).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to manage users.".to_string(),
            ));
        }

        let users = if actor.is_superuser {
            self.users.list_all().await?
        } else {
            let manageable = self.decider.resolver().manageable_users(actor).await?;
            let ids: Vec<Uuid> = manageable.into_set().into_iter().collect();
            self.users.list_by_ids(&ids).await?
        };

        let mut responses = Vec::with_capacity(users.len());
        for user in &users {
            let memberships = self
                .decider
                .resolver()
                .describe_memberships(user.id)
                .await?;
            responses.push(UserResponse::new(user, memberships));
        }

        Ok(responses)
    }

    /// A single managed user.
    pub async fn get_user(&self, actor: &User, target_id: Uuid) -> Result<UserResponse> {
        let target = self.find_target(target_id).await?;

        if !self.decider.can_manage_user(actor, &target).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to manage this user.".to_string(),
            ));
        }

        let memberships = self
            .decider
            .resolver()
            .describe_memberships(target.id)
            .await?;
        Ok(UserResponse::new(&target, memberships))
    }

    /// Delete a managed user. Superusers hard-delete; other managers only
    /// deactivate, preserving the row.
    pub async fn delete_user(&self, actor: &User, target_id: Uuid) -> Result<()> {
        let target = self.find_target(target_id).await?;

        if !self.decider.can_manage_user(actor, &target).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to manage this user.".to_string(),
            ));
        }

        if actor.is_superuser {
            self.users.delete(target.id).await?;
            tracing::info!(user = %target.email, "User deleted");
        } else {
            self.users.set_active(target.id, false).await?;
            tracing::info!(user = %target.email, "User deactivated in place of delete");
        }

        Ok(())
    }

    /// Activate a deactivated user.
    ///
    /// Accounts normally activate through invitation acceptance. A superuser
    /// may override for an unaccepted invitee; the override also marks the
    /// invitation accepted so the record cannot reach active-but-unaccepted.
    pub async fn activate(&self, actor: &User, target_id: Uuid) -> Result<User> {
        let target = self.find_target(target_id).await?;

        if !self.decider.can_manage_user(actor, &target).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to manage this user.".to_string(),
            ));
        }

        if target.is_active {
            return Err(AppError::BadRequest("User is already active".to_string()));
        }

        if !target.invitation_accepted {
            if !actor.is_superuser {
                return Err(AppError::BadRequest(
                    "User must accept their invitation before being activated. \
                     Please resend the invitation email."
                        .to_string(),
                ));
            }
            // mark_invitation_accepted also sets is_active
            return self
                .users
                .mark_invitation_accepted(target.id, chrono::Utc::now())
                .await;
        }

        self.users.set_active(target.id, true).await
    }

    /// Deactivate a user. Never yourself.
    pub async fn deactivate(&self, actor: &User, target_id: Uuid) -> Result<User> {
        if actor.id == target_id {
            return Err(AppError::BadRequest("Cannot deactivate yourself".to_string()));
        }

        let target = self.find_target(target_id).await?;

        if !self.decider.can_manage_user(actor, &target).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to manage this user.".to_string(),
            ));
        }

        if !target.is_active {
            return Err(AppError::BadRequest("User is already inactive".to_string()));
        }

        self.users.set_active(target.id, false).await
    }

    /// Resend the invitation email with a fresh token.
    pub async fn resend_invitation(&self, actor: &User, target_id: Uuid) -> Result<User> {
        let target = self.find_target(target_id).await?;

        if !self.decider.can_manage_user(actor, &target).await? {
            return Err(AppError::Forbidden(
                "You do not have permission to resend invitations for this user.".to_string(),
            ));
        }

        let role_info = self.role_info_for(&target).await?;
        self.invitations.resend(&target, &role_info).await
    }

    /// Console statistics.
    pub async fn user_stats(&self) -> Result<UserStats> {
        Ok(UserStats {
            total_users: self.users.count().await?,
            active_users: self.users.count_active().await?,
            admin_users: self.users.count_admins().await?,
            tenants: self.users.count_tenants().await?,
        })
    }

    /// Properties and groups the actor may manage, with group nesting.
    pub async fn manageable_scopes(&self, actor: &User) -> Result<ManageableScopes> {
        let resolver = self.decider.resolver();

        if actor.is_superuser {
            let mut properties = Vec::new();
            for property in self.properties.list_properties().await? {
                properties.push(self.with_group(&property).await?);
            }
            let property_groups = self
                .properties
                .list_groups()
                .await?
                .iter()
                .map(GroupRef::from)
                .collect();
            return Ok(ManageableScopes {
                can_manage_all: true,
                properties,
                property_groups,
            });
        }

        let mut properties = Vec::new();
        for property_id in resolver.manageable_properties(actor).await?.into_set() {
            if let Some(property) = self.properties.find_property(property_id).await? {
                properties.push(self.with_group(&property).await?);
            }
        }

        let mut property_groups = Vec::new();
        for group_id in resolver.manageable_property_groups(actor).await?.into_set() {
            if let Some(group) = self.properties.find_group(group_id).await? {
                property_groups.push(GroupRef::from(&group));
            }
        }

        Ok(ManageableScopes {
            can_manage_all: false,
            properties,
            property_groups,
        })
    }

    /// Roles the actor may hand out.
    pub async fn role_options(&self, actor: &User) -> Result<Vec<Role>> {
        self.decider.role_options(actor).await
    }

    async fn find_target(&self, target_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
    }

    async fn with_group(&self, property: &crate::domain::Property) -> Result<PropertyWithGroup> {
        let group = match property.property_group_id {
            Some(group_id) => self
                .properties
                .find_group(group_id)
                .await?
                .as_ref()
                .map(GroupRef::from),
            None => None,
        };
        Ok(PropertyWithGroup {
            id: property.id,
            name: property.name.clone(),
            property_group: group,
        })
    }

    /// Role context for invitation emails: the highest-rank membership with
    /// its scope names. Superusers and membership-less users get plain labels.
    async fn role_info_for(&self, target: &User) -> Result<RoleInfo> {
        if target.is_superuser {
            return Ok(RoleInfo {
                role_label: Role::SuperUser.label().to_string(),
                ..Default::default()
            });
        }

        let memberships = self
            .decider
            .resolver()
            .describe_memberships(target.id)
            .await?;
        let Some(primary) = memberships.iter().max_by_key(|m| m.role) else {
            return Ok(RoleInfo {
                role_label: "User".to_string(),
                ..Default::default()
            });
        };

        Ok(RoleInfo {
            role_label: primary.role.label().to_string(),
            property_name: primary.property_name.clone(),
            property_group_name: primary.property_group_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InvitationConfig;
    use crate::email::MockInvitationNotifier;
    use crate::repository::membership::MockMembershipRepository;
    use crate::repository::property::MockPropertyRepository;
    use crate::repository::user::MockUserRepository;

    fn service(
        users: MockUserRepository,
        memberships: MockMembershipRepository,
        properties: MockPropertyRepository,
        notifier: MockInvitationNotifier,
    ) -> UserService<
        MockUserRepository,
        MockMembershipRepository,
        MockPropertyRepository,
        MockInvitationNotifier,
    > {
        let users = Arc::new(users);
        let invitations = Arc::new(InvitationService::new(
            users.clone(),
            Arc::new(notifier),
            InvitationConfig::default(),
        ));
        UserService::new(
            users,
            Arc::new(memberships),
            Arc::new(properties),
            invitations,
        )
    }

    fn superuser() -> User {
        User {
            email: "super@example.com".to_string(),
            is_superuser: true,
            is_active: true,
            ..Default::default()
        }
    }

    fn group_admin_actor() -> (User, Uuid) {
        let actor = User {
            email: "groupadmin@example.com".to_string(),
            is_staff: true,
            is_active: true,
            ..Default::default()
        };
        (actor, Uuid::new_v4())
    }

    fn create_input(role: Role, property_id: Option<Uuid>, group_id: Option<Uuid>) -> CreateUserInput {
        CreateUserInput {
            email: "newuser@example.com".to_string(),
            password: "testpass123".to_string(),
            first_name: Some("New".to_string()),
            last_name: Some("User".to_string()),
            role,
            property_id,
            property_group_id: group_id,
        }
    }

    #[tokio::test]
    async fn test_group_admin_creating_super_user_is_permission_error() {
        let (actor, group_id) = group_admin_actor();
        let actor_id = actor.id;

        let mut memberships = MockMembershipRepository::new();
        memberships.expect_list_by_user().returning(move |_| {
            Ok(vec![Membership {
                user_id: actor_id,
                property_group_id: Some(group_id),
                role: Role::GroupAdmin,
                ..Default::default()
            }])
        });

        let service = service(
            MockUserRepository::new(),
            memberships,
            MockPropertyRepository::new(),
            MockInvitationNotifier::new(),
        );

        // structurally valid (no scope), so the failure must be a denial
        let result = service
            .create_user(&actor, create_input(Role::SuperUser, None, None))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_super_user_with_scope_is_validation_error_even_for_superusers() {
        let service = service(
            MockUserRepository::new(),
            MockMembershipRepository::new(),
            MockPropertyRepository::new(),
            MockInvitationNotifier::new(),
        );

        let result = service
            .create_user(
                &superuser(),
                create_input(Role::SuperUser, Some(Uuid::new_v4()), None),
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email_conflicts() {
        let property_id = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(|_| Ok(Some(User::default())));

        let mut properties = MockPropertyRepository::new();
        properties.expect_find_property().returning(move |id| {
            Ok(Some(crate::domain::Property {
                id,
                name: "Test Mall".to_string(),
                ..Default::default()
            }))
        });

        let service = service(
            users,
            MockMembershipRepository::new(),
            properties,
            MockInvitationNotifier::new(),
        );

        let result = service
            .create_user(
                &superuser(),
                create_input(Role::Tenant, Some(property_id), None),
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_tenant_sends_invitation_and_stays_inactive() {
        let property_id = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|user| !user.is_active && !user.invitation_accepted)
            .returning(|user| Ok(user.clone()));
        users
            .expect_mark_invitation_sent()
            .returning(|id, token, sent_at| {
                Ok(User {
                    id,
                    invitation_sent: true,
                    invitation_token: Some(token.to_string()),
                    invitation_sent_at: Some(sent_at),
                    ..Default::default()
                })
            });

        let mut memberships = MockMembershipRepository::new();
        memberships
            .expect_create()
            .withf(move |m| m.role == Role::Tenant && m.property_id == Some(property_id))
            .returning(|m| Ok(m.clone()));

        let mut properties = MockPropertyRepository::new();
        properties.expect_find_property().returning(move |id| {
            Ok(Some(crate::domain::Property {
                id,
                name: "Test Mall".to_string(),
                ..Default::default()
            }))
        });

        let mut notifier = MockInvitationNotifier::new();
        notifier
            .expect_send_invitation()
            .times(1)
            .withf(|_, url, role_info| {
                url.contains("/accept-invitation/") && role_info.role_label == "Tenant"
            })
            .returning(|_, _, _| Ok(()));

        let service = service(users, memberships, properties, notifier);
        let created = service
            .create_user(
                &superuser(),
                create_input(Role::Tenant, Some(property_id), None),
            )
            .await
            .unwrap();

        assert!(created.invitation_sent);
        assert!(!created.is_active);
    }

    #[tokio::test]
    async fn test_create_superuser_is_active_without_invitation() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|user| user.is_superuser && user.is_active && user.invitation_accepted)
            .returning(|user| Ok(user.clone()));

        // no membership row and no email for superusers
        let service = service(
            users,
            MockMembershipRepository::new(),
            MockPropertyRepository::new(),
            MockInvitationNotifier::new(),
        );

        let created = service
            .create_user(&superuser(), create_input(Role::SuperUser, None, None))
            .await
            .unwrap();
        assert!(created.is_active);
    }

    #[tokio::test]
    async fn test_cannot_deactivate_self() {
        let service = service(
            MockUserRepository::new(),
            MockMembershipRepository::new(),
            MockPropertyRepository::new(),
            MockInvitationNotifier::new(),
        );
        let actor = superuser();

        let result = service.deactivate(&actor, actor.id).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_activate_unaccepted_rejected_for_non_superuser() {
        let (actor, group_id) = group_admin_actor();
        let actor_id = actor.id;
        let property_id = Uuid::new_v4();

        let target = User {
            email: "invitee@example.com".to_string(),
            invitation_sent: true,
            ..Default::default()
        };
        let target_id = target.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));

        let mut memberships = MockMembershipRepository::new();
        memberships.expect_list_by_user().returning(move |user_id| {
            if user_id == actor_id {
                Ok(vec![Membership {
                    user_id: actor_id,
                    property_group_id: Some(group_id),
                    role: Role::GroupAdmin,
                    ..Default::default()
                }])
            } else {
                Ok(vec![])
            }
        });
        memberships.expect_list_by_group().returning(move |_| {
            Ok(vec![Membership {
                user_id: target_id,
                property_group_id: Some(group_id),
                role: Role::Tenant,
                ..Default::default()
            }])
        });

        let mut properties = MockPropertyRepository::new();
        properties.expect_properties_in_group().returning(move |_| {
            Ok(vec![crate::domain::Property {
                id: property_id,
                name: "Test Mall".to_string(),
                ..Default::default()
            }])
        });

        memberships
            .expect_list_by_property()
            .returning(|_| Ok(vec![]));

        let service = service(users, memberships, properties, MockInvitationNotifier::new());
        let result = service.activate(&actor, target_id).await;

        match result {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("accept their invitation")),
            other => panic!("expected BadRequest, got {:?}", other.map(|u| u.email)),
        }
    }

    #[tokio::test]
    async fn test_superuser_override_marks_invitation_accepted() {
        let target = User {
            email: "invitee@example.com".to_string(),
            invitation_sent: true,
            ..Default::default()
        };
        let target_id = target.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        users
            .expect_mark_invitation_accepted()
            .times(1)
            .returning(|id, accepted_at| {
                Ok(User {
                    id,
                    is_active: true,
                    invitation_sent: true,
                    invitation_accepted: true,
                    invitation_accepted_at: Some(accepted_at),
                    ..Default::default()
                })
            });

        let service = service(
            users,
            MockMembershipRepository::new(),
            MockPropertyRepository::new(),
            MockInvitationNotifier::new(),
        );

        let activated = service.activate(&superuser(), target_id).await.unwrap();
        assert!(activated.is_active);
        assert!(activated.invitation_accepted);
    }

    #[tokio::test]
    async fn test_resend_requires_management_authority() {
        let actor = User {
            email: "tenant@example.com".to_string(),
            is_active: true,
            ..Default::default()
        };
        let target = User {
            email: "other@example.com".to_string(),
            ..Default::default()
        };
        let target_id = target.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));

        let mut memberships = MockMembershipRepository::new();
        memberships.expect_list_by_user().returning(|_| Ok(vec![]));

        let service = service(
            users,
            memberships,
            MockPropertyRepository::new(),
            MockInvitationNotifier::new(),
        );

        let result = service.resend_invitation(&actor, target_id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
