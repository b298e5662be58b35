//! Scope Resolver
//!
//! Computes the set of properties, groups, users, and campaigns an actor can
//! reach, by walking the tenancy graph through explicit repository calls.
//! Results are unions across all of the actor's memberships; holding no
//! memberships yields empty sets, never an error.

use crate::domain::{MembershipInfo, MembershipScope, Role, User};
use crate::error::Result;
use crate::repository::{MembershipRepository, PropertyRepository};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// A resolved reachable set.
///
/// Superusers are unrestricted; `All` keeps that symbolic instead of
/// materializing the whole table. Callers that must render a listing expand
/// `All` with a repository list call.
#[derive(Debug, Clone)]
pub enum Resolved<T> {
    All,
    Only(HashSet<T>),
}

impl<T: Eq + std::hash::Hash> PartialEq for Resolved<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Resolved::All, Resolved::All) => true,
            (Resolved::Only(a), Resolved::Only(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: Eq + std::hash::Hash> Eq for Resolved<T> {}

impl<T: Eq + std::hash::Hash> Resolved<T> {
    pub fn none() -> Self {
        Resolved::Only(HashSet::new())
    }

    pub fn contains(&self, item: &T) -> bool {
        match self {
            Resolved::All => true,
            Resolved::Only(set) => set.contains(item),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Resolved::All)
    }

    /// The enumerated set; empty for `All` (callers check `is_unrestricted`
    /// before expanding).
    pub fn into_set(self) -> HashSet<T> {
        match self {
            Resolved::All => HashSet::new(),
            Resolved::Only(set) => set,
        }
    }
}

/// A campaign as seen by this core: just enough to scope it.
///
/// Campaign rows live in an external collaborator; only the identifiers
/// needed for visibility decisions cross the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRef {
    pub id: Uuid,
    pub property_id: Uuid,
    pub created_by: Uuid,
}

/// Read-only port onto the external campaign store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignDirectory: Send + Sync {
    /// The campaign ID universe with scoping identifiers
    async fn list_all(&self) -> Result<Vec<CampaignRef>>;
}

/// Scope resolution over the tenancy graph
pub struct ScopeResolver<MR, PR>
where
    MR: MembershipRepository,
    PR: PropertyRepository,
{
    memberships: Arc<MR>,
    properties: Arc<PR>,
}

impl<MR, PR> ScopeResolver<MR, PR>
where
    MR: MembershipRepository,
    PR: PropertyRepository,
{
    pub fn new(memberships: Arc<MR>, properties: Arc<PR>) -> Self {
        Self {
            memberships,
            properties,
        }
    }

    /// Properties the actor may administer.
    pub async fn manageable_properties(&self, actor: &User) -> Result<Resolved<Uuid>> {
        if actor.is_superuser {
            return Ok(Resolved::All);
        }

        let mut property_ids = HashSet::new();
        for membership in self.memberships.list_by_user(actor.id).await? {
            match (membership.role, membership.scope()) {
                (Role::GroupAdmin, Some(MembershipScope::PropertyGroup(group_id))) => {
                    for property in self.properties.properties_in_group(group_id).await? {
                        property_ids.insert(property.id);
                    }
                }
                (Role::PropertyAdmin, Some(MembershipScope::Property(property_id))) => {
                    property_ids.insert(property_id);
                }
                _ => {}
            }
        }

        Ok(Resolved::Only(property_ids))
    }

    /// Property groups the actor may administer.
    pub async fn manageable_property_groups(&self, actor: &User) -> Result<Resolved<Uuid>> {
        if actor.is_superuser {
            return Ok(Resolved::All);
        }

        let mut group_ids = HashSet::new();
        for membership in self.memberships.list_by_user(actor.id).await? {
            if membership.role == Role::GroupAdmin {
                if let Some(MembershipScope::PropertyGroup(group_id)) = membership.scope() {
                    group_ids.insert(group_id);
                }
            }
        }

        Ok(Resolved::Only(group_ids))
    }

    /// Users the actor may administer.
    ///
    /// Group admins reach property admins and tenants anywhere in their
    /// group (on its properties or directly on the group); property admins
    /// reach tenants of their property. The actor is never in their own
    /// manageable set.
    pub async fn manageable_users(&self, actor: &User) -> Result<Resolved<Uuid>> {
        if actor.is_superuser {
            return Ok(Resolved::All);
        }

        let mut user_ids = HashSet::new();
        for membership in self.memberships.list_by_user(actor.id).await? {
            match (membership.role, membership.scope()) {
                (Role::GroupAdmin, Some(MembershipScope::PropertyGroup(group_id))) => {
                    for property in self.properties.properties_in_group(group_id).await? {
                        self.collect_members(
                            property.id,
                            &[Role::PropertyAdmin, Role::Tenant],
                            &mut user_ids,
                        )
                        .await?;
                    }
                    for direct in self.memberships.list_by_group(group_id).await? {
                        if matches!(direct.role, Role::PropertyAdmin | Role::Tenant) {
                            user_ids.insert(direct.user_id);
                        }
                    }
                }
                (Role::PropertyAdmin, Some(MembershipScope::Property(property_id))) => {
                    self.collect_members(property_id, &[Role::Tenant], &mut user_ids)
                        .await?;
                }
                _ => {}
            }
        }

        user_ids.remove(&actor.id);

        Ok(Resolved::Only(user_ids))
    }

    /// Properties the actor can see at all: everything manageable plus the
    /// scopes of their own memberships (a tenant sees their own property).
    pub async fn visible_properties(&self, actor: &User) -> Result<Resolved<Uuid>> {
        let mut resolved = self.manageable_properties(actor).await?;
        if resolved.is_unrestricted() {
            return Ok(resolved);
        }

        if let Resolved::Only(ref mut property_ids) = resolved {
            for membership in self.memberships.list_by_user(actor.id).await? {
                match membership.scope() {
                    Some(MembershipScope::Property(property_id)) => {
                        property_ids.insert(property_id);
                    }
                    Some(MembershipScope::PropertyGroup(group_id)) => {
                        for property in self.properties.properties_in_group(group_id).await? {
                            property_ids.insert(property.id);
                        }
                    }
                    None => {}
                }
            }
        }

        Ok(resolved)
    }

    /// Campaign IDs visible to the actor.
    ///
    /// The ID universe comes from the external campaign collaborator; the
    /// scope decision happens here: a campaign is visible when its property
    /// is visible to the actor, or the actor created it.
    pub async fn visible_campaign_ids(
        &self,
        actor: &User,
        directory: &dyn CampaignDirectory,
    ) -> Result<HashSet<Uuid>> {
        let campaigns = directory.list_all().await?;

        if actor.is_superuser {
            return Ok(campaigns.into_iter().map(|c| c.id).collect());
        }

        let visible = self.visible_properties(actor).await?;
        Ok(campaigns
            .into_iter()
            .filter(|c| c.created_by == actor.id || visible.contains(&c.property_id))
            .map(|c| c.id)
            .collect())
    }

    /// Users who should hear about activity on a campaign: its creator, the
    /// property admins of its property, and the group admins of that
    /// property's group.
    pub async fn notification_recipients(&self, campaign: &CampaignRef) -> Result<HashSet<Uuid>> {
        let mut user_ids = HashSet::new();
        user_ids.insert(campaign.created_by);

        for membership in self
            .memberships
            .list_by_property(campaign.property_id)
            .await?
        {
            if membership.role == Role::PropertyAdmin {
                user_ids.insert(membership.user_id);
            }
        }

        if let Some(group) = self.properties.group_of(campaign.property_id).await? {
            for membership in self.memberships.list_by_group(group.id).await? {
                if membership.role == Role::GroupAdmin {
                    user_ids.insert(membership.user_id);
                }
            }
        }

        Ok(user_ids)
    }

    /// The user's memberships rendered with property and group names, for
    /// listings and token claims. A property entry nests its owning group
    /// when the property belongs to one.
    pub async fn describe_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<MembershipInfo>> {
        let mut infos = Vec::new();
        for membership in self.memberships.list_by_user(user_id).await? {
            let mut info = MembershipInfo {
                role: membership.role,
                scope: None,
                property_id: None,
                property_name: None,
                property_group_id: None,
                property_group_name: None,
            };
            match membership.scope() {
                Some(MembershipScope::Property(property_id)) => {
                    if let Some(property) = self.properties.find_property(property_id).await? {
                        info.property_id = Some(property.id);
                        info.property_name = Some(property.name.clone());
                        if let Some(group_id) = property.property_group_id {
                            if let Some(group) = self.properties.find_group(group_id).await? {
                                info.property_group_id = Some(group.id);
                                info.property_group_name = Some(group.name);
                            }
                        }
                    } else {
                        info.property_id = Some(property_id);
                    }
                }
                Some(MembershipScope::PropertyGroup(group_id)) => {
                    if let Some(group) = self.properties.find_group(group_id).await? {
                        info.property_group_id = Some(group.id);
                        info.property_group_name = Some(group.name);
                    } else {
                        info.property_group_id = Some(group_id);
                    }
                }
                None => {}
            }
            infos.push(info);
        }
        Ok(infos)
    }

    async fn collect_members(
        &self,
        property_id: Uuid,
        roles: &[Role],
        into: &mut HashSet<Uuid>,
    ) -> Result<()> {
        for membership in self.memberships.list_by_property(property_id).await? {
            if roles.contains(&membership.role) {
                into.insert(membership.user_id);
            }
        }
        Ok(())
    }
}
