//! Permission Decider
//!
//! Stateless predicates over the Scope Resolver, consumed by the request
//! layer before any mutating or listing operation on users, properties, or
//! property groups. Structural role/scope validation lives here too, but is
//! a distinct error family: a malformed role/scope combination is a
//! `Validation` error, a correctly-formed but unauthorized request is a
//! `Forbidden` denial.

use crate::domain::{MembershipScope, Role, User};
use crate::error::{AppError, Result};
use crate::repository::{MembershipRepository, PropertyRepository};
use crate::scope::ScopeResolver;
use std::sync::Arc;
use uuid::Uuid;

/// Structural rules for a role/scope combination, independent of any actor.
///
/// `group_admin` requires a group scope and forbids a property scope;
/// `property_admin` and `tenant` require a property scope and forbid a group
/// scope; `super_user` forbids both (superusers hold no memberships).
pub fn validate_role_scope(
    role: Role,
    property_id: Option<Uuid>,
    group_id: Option<Uuid>,
) -> Result<()> {
    match role {
        Role::GroupAdmin => {
            if property_id.is_some() {
                return Err(AppError::Validation(
                    "group_admin cannot be scoped to a property".to_string(),
                ));
            }
            if group_id.is_none() {
                return Err(AppError::Validation(
                    "group_admin requires a property_group_id".to_string(),
                ));
            }
        }
        Role::PropertyAdmin | Role::Tenant => {
            if group_id.is_some() {
                return Err(AppError::Validation(format!(
                    "{} cannot be scoped to a property group",
                    role
                )));
            }
            if property_id.is_none() {
                return Err(AppError::Validation(format!(
                    "{} requires a property_id",
                    role
                )));
            }
        }
        Role::SuperUser => {
            if property_id.is_some() || group_id.is_some() {
                return Err(AppError::Validation(
                    "super_user cannot carry a property or property group scope".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Permission decisions for the management surface
pub struct PermissionDecider<MR, PR>
where
    MR: MembershipRepository,
    PR: PropertyRepository,
{
    memberships: Arc<MR>,
    properties: Arc<PR>,
    resolver: ScopeResolver<MR, PR>,
}

impl<MR, PR> PermissionDecider<MR, PR>
where
    MR: MembershipRepository,
    PR: PropertyRepository,
{
    pub fn new(memberships: Arc<MR>, properties: Arc<PR>) -> Self {
        let resolver = ScopeResolver::new(memberships.clone(), properties.clone());
        Self {
            memberships,
            properties,
            resolver,
        }
    }

    pub fn resolver(&self) -> &ScopeResolver<MR, PR> {
        &self.resolver
    }

    /// True for superusers and holders of at least one admin-role membership.
    pub async fn can_view_management_console(&self, actor: &User) -> Result<bool> {
        if actor.is_superuser {
            return Ok(true);
        }

        let memberships = self.memberships.list_by_user(actor.id).await?;
        Ok(memberships.iter().any(|m| m.role.is_admin()))
    }

    /// Whether `actor` may administer `target`.
    ///
    /// Self-management is always denied here (no privilege self-escalation),
    /// superusers manage everyone, and only superusers manage superusers.
    /// Otherwise the target must be in the actor's manageable set, computed
    /// live from current memberships.
    pub async fn can_manage_user(&self, actor: &User, target: &User) -> Result<bool> {
        if actor.id == target.id {
            return Ok(false);
        }
        if actor.is_superuser {
            return Ok(true);
        }
        if target.is_superuser {
            return Ok(false);
        }

        Ok(self
            .resolver
            .manageable_users(actor)
            .await?
            .contains(&target.id))
    }

    /// Whether `actor` may hand out `role` within the referenced scope.
    ///
    /// This is the authority check only; callers validate the role/scope
    /// structure first with [`validate_role_scope`].
    pub async fn can_assign_role(
        &self,
        actor: &User,
        role: Role,
        property_id: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> Result<bool> {
        if actor.is_superuser {
            return Ok(true);
        }
        // Only superusers mint superusers or group admins
        if matches!(role, Role::SuperUser | Role::GroupAdmin) {
            return Ok(false);
        }

        for membership in self.memberships.list_by_user(actor.id).await? {
            match (membership.role, membership.scope()) {
                (Role::GroupAdmin, Some(MembershipScope::PropertyGroup(own_group))) => {
                    // property_admin or tenant, anywhere inside the actor's group
                    if let Some(target_property) = property_id {
                        if let Some(group) = self.properties.group_of(target_property).await? {
                            if group.id == own_group {
                                return Ok(true);
                            }
                        }
                    }
                    if group_id == Some(own_group) {
                        return Ok(true);
                    }
                }
                (Role::PropertyAdmin, Some(MembershipScope::Property(own_property))) => {
                    if role == Role::Tenant && property_id == Some(own_property) {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }

        Ok(false)
    }

    /// Roles the actor may hand out, highest rank first (console dropdowns).
    pub async fn role_options(&self, actor: &User) -> Result<Vec<Role>> {
        if actor.is_superuser {
            return Ok(vec![
                Role::SuperUser,
                Role::GroupAdmin,
                Role::PropertyAdmin,
                Role::Tenant,
            ]);
        }

        let mut options = Vec::new();
        for membership in self.memberships.list_by_user(actor.id).await? {
            match membership.role {
                Role::GroupAdmin => {
                    for role in [Role::PropertyAdmin, Role::Tenant] {
                        if !options.contains(&role) {
                            options.push(role);
                        }
                    }
                }
                Role::PropertyAdmin => {
                    if !options.contains(&Role::Tenant) {
                        options.push(Role::Tenant);
                    }
                }
                _ => {}
            }
        }
        options.sort_by(|a, b| b.cmp(a));

        Ok(options)
    }
}
