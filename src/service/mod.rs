//! Business logic services

pub mod invitation;
pub mod sso;
pub mod user;

pub use invitation::InvitationService;
pub use sso::{build_claims, SsoService, TokenPair};
pub use user::{ManageableScopes, UserService};
