//! SSO token issue, claim building, and introspection
//!
//! Claims are self-contained: a remote verifier gets the resolved role and
//! the full membership scope without calling back. The introspection path
//! recomputes the same shape fresh from the database for callers that need
//! current state rather than token-embedded state.

use crate::crypto;
use crate::domain::{App, AppRef, MembershipInfo, Role, User};
use crate::error::{AppError, Result};
use crate::jwt::{JwtManager, SsoClaims};
use crate::repository::{AppRepository, MembershipRepository, PropertyRepository, UserRepository};
use crate::scope::ScopeResolver;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Response of the token-obtain endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub claims: SsoClaims,
}

/// Build the claim payload for a user.
///
/// Pure: everything the claims contain is in the arguments. Registered
/// claims (iss, iat, exp, token_type) are stamped at signing time.
pub fn build_claims(user: &User, memberships: &[MembershipInfo], app: Option<&App>) -> SsoClaims {
    let (role, membership_list) = if user.is_superuser {
        (
            Some(Role::SuperUser),
            vec![MembershipInfo {
                role: Role::SuperUser,
                scope: Some("global".to_string()),
                property_id: None,
                property_name: None,
                property_group_id: None,
                property_group_name: None,
            }],
        )
    } else {
        (
            memberships.iter().map(|m| m.role).max(),
            memberships.to_vec(),
        )
    };

    SsoClaims {
        sub: user.id.to_string(),
        iss: String::new(),
        token_type: String::new(),
        email: user.email.clone(),
        first_name: user.first_name.clone().unwrap_or_default(),
        last_name: user.last_name.clone().unwrap_or_default(),
        is_superuser: user.is_superuser,
        is_staff: user.is_staff,
        is_active: user.is_active,
        role,
        memberships: membership_list,
        app_id: app.map(|a| a.id),
        app_name: app.map(|a| a.name.clone()),
        app_slug: app.map(|a| a.slug.clone()),
        iat: 0,
        exp: 0,
    }
}

/// SSO service: credentials in, signed claims out
pub struct SsoService<UR, MR, PR, AR>
where
    UR: UserRepository,
    MR: MembershipRepository,
    PR: PropertyRepository,
    AR: AppRepository,
{
    users: Arc<UR>,
    apps: Arc<AR>,
    resolver: ScopeResolver<MR, PR>,
    jwt: JwtManager,
}

impl<UR, MR, PR, AR> SsoService<UR, MR, PR, AR>
where
    UR: UserRepository,
    MR: MembershipRepository,
    PR: PropertyRepository,
    AR: AppRepository,
{
    pub fn new(users: Arc<UR>, memberships: Arc<MR>, properties: Arc<PR>, apps: Arc<AR>, jwt: JwtManager) -> Self {
        Self {
            users,
            apps,
            resolver: ScopeResolver::new(memberships, properties),
            jwt,
        }
    }

    /// Exchange credentials and an app reference for signed tokens.
    ///
    /// The app must exist and be active (validation error otherwise, since
    /// the caller can correct the reference); the user must be on the app's
    /// access list (a flat allowlist check, not the role lattice - denial
    /// is a permission error).
    pub async fn obtain_token(
        &self,
        email: &str,
        password: &str,
        app_ref: Option<AppRef>,
    ) -> Result<TokenPair> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .filter(|u| u.is_active && crypto::verify_password(password, &u.password_hash))
            .ok_or_else(|| {
                AppError::Unauthorized(
                    "No active account found with the given credentials".to_string(),
                )
            })?;

        let app_ref = app_ref.ok_or_else(|| {
            AppError::Validation("Either app_id or app_slug is required".to_string())
        })?;
        let app = self.resolve_app(&app_ref).await?;

        if !self.apps.user_has_access(user.id, app.id).await? {
            return Err(AppError::Forbidden(
                "You do not have access to this app.".to_string(),
            ));
        }

        let memberships = self.resolver.describe_memberships(user.id).await?;
        let claims = build_claims(&user, &memberships, Some(&app));

        let access = self.jwt.sign_access_token(claims.clone())?;
        let refresh = self.jwt.create_refresh_token(user.id, Some(app.id))?;

        // Return the claims as signed (iss/iat/exp stamped) for the caller
        let claims = self.jwt.verify_access_token(&access)?;

        Ok(TokenPair {
            access,
            refresh,
            claims,
        })
    }

    /// Recompute claims for a live bearer token.
    ///
    /// The token proves identity; everything else is re-read so callers see
    /// current role and scope. A vanished or deactivated app context
    /// degrades to null app fields rather than failing.
    pub async fn introspect(&self, access_token: &str) -> Result<SsoClaims> {
        let presented = self.jwt.verify_access_token(access_token)?;

        let user_id = Uuid::parse_str(&presented.sub)
            .map_err(|_| AppError::Unauthorized("Malformed token subject".to_string()))?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown token subject".to_string()))?;

        let app = match presented.app_id {
            Some(app_id) => self.apps.find_active_by_id(app_id).await?,
            None => None,
        };

        let memberships = self.resolver.describe_memberships(user.id).await?;
        let mut claims = build_claims(&user, &memberships, app.as_ref());
        claims.iss = presented.iss;
        claims.token_type = presented.token_type;
        claims.iat = presented.iat;
        claims.exp = presented.exp;

        Ok(claims)
    }

    async fn resolve_app(&self, app_ref: &AppRef) -> Result<App> {
        match app_ref {
            AppRef::Id(id) => self.apps.find_active_by_id(*id).await?.ok_or_else(|| {
                AppError::Validation("Invalid app ID or app is not active.".to_string())
            }),
            AppRef::Slug(slug) => self.apps.find_active_by_slug(slug).await?.ok_or_else(|| {
                AppError::Validation("Invalid app slug or app is not active.".to_string())
            }),
        }
    }
}
