//! Application state traits for dependency injection
//!
//! Handlers are generic over these traits so the same code serves the
//! production `AppState` and test states built over in-memory repositories.

use crate::config::Config;
use crate::email::{InvitationNotifier, SmtpNotifier};
use crate::jwt::JwtManager;
use crate::repository::{
    app::AppRepositoryImpl, membership::MembershipRepositoryImpl,
    property::PropertyRepositoryImpl, user::UserRepositoryImpl, AppRepository,
    MembershipRepository, PropertyRepository, UserRepository,
};
use crate::service::{InvitationService, SsoService, UserService};
use std::sync::Arc;

/// Trait for states that provide the invitation lifecycle
pub trait HasInvitations: Clone + Send + Sync + 'static {
    /// The user repository type
    type UserRepo: UserRepository;
    /// The notifier type
    type Notifier: InvitationNotifier;

    /// Get the invitation service
    fn invitation_service(&self) -> &InvitationService<Self::UserRepo, Self::Notifier>;
}

/// Trait for states that provide SSO token issue and introspection
pub trait HasSso: Clone + Send + Sync + 'static {
    /// The user repository type
    type UserRepo: UserRepository;
    /// The membership repository type
    type MembershipRepo: MembershipRepository;
    /// The property repository type
    type PropertyRepo: PropertyRepository;
    /// The app repository type
    type AppRepo: AppRepository;

    /// Get the SSO service
    fn sso_service(
        &self,
    ) -> &SsoService<Self::UserRepo, Self::MembershipRepo, Self::PropertyRepo, Self::AppRepo>;
}

/// Production application state
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    user_service:
        Arc<UserService<UserRepositoryImpl, MembershipRepositoryImpl, PropertyRepositoryImpl, SmtpNotifier>>,
    invitation_service: Arc<InvitationService<UserRepositoryImpl, SmtpNotifier>>,
    sso_service: Arc<
        SsoService<UserRepositoryImpl, MembershipRepositoryImpl, PropertyRepositoryImpl, AppRepositoryImpl>,
    >,
}

impl AppState {
    pub fn new(config: Config, pool: sqlx::MySqlPool) -> anyhow::Result<Self> {
        let users = Arc::new(UserRepositoryImpl::new(pool.clone()));
        let memberships = Arc::new(MembershipRepositoryImpl::new(pool.clone()));
        let properties = Arc::new(PropertyRepositoryImpl::new(pool.clone()));
        let apps = Arc::new(AppRepositoryImpl::new(pool));

        let notifier = Arc::new(
            SmtpNotifier::from_config(
                &config.email,
                &config.invitation.site_name,
                config.invitation.expiry_days,
            )
            .map_err(|e| anyhow::anyhow!("SMTP configuration: {}", e))?,
        );

        let invitation_service = Arc::new(InvitationService::new(
            users.clone(),
            notifier,
            config.invitation.clone(),
        ));
        let user_service = Arc::new(UserService::new(
            users.clone(),
            memberships.clone(),
            properties.clone(),
            invitation_service.clone(),
        ));
        let sso_service = Arc::new(SsoService::new(
            users,
            memberships,
            properties,
            apps,
            JwtManager::new(config.jwt.clone()),
        ));

        Ok(Self {
            config: Arc::new(config),
            user_service,
            invitation_service,
            sso_service,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn user_service(
        &self,
    ) -> &UserService<UserRepositoryImpl, MembershipRepositoryImpl, PropertyRepositoryImpl, SmtpNotifier>
    {
        &self.user_service
    }
}

impl HasInvitations for AppState {
    type UserRepo = UserRepositoryImpl;
    type Notifier = SmtpNotifier;

    fn invitation_service(&self) -> &InvitationService<Self::UserRepo, Self::Notifier> {
        &self.invitation_service
    }
}

impl HasSso for AppState {
    type UserRepo = UserRepositoryImpl;
    type MembershipRepo = MembershipRepositoryImpl;
    type PropertyRepo = PropertyRepositoryImpl;
    type AppRepo = AppRepositoryImpl;

    fn sso_service(
        &self,
    ) -> &SsoService<Self::UserRepo, Self::MembershipRepo, Self::PropertyRepo, Self::AppRepo> {
        &self.sso_service
    }
}
