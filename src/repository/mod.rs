//! Data access layer (Repository pattern)
//!
//! Every tenancy-graph traversal the Scope Resolver performs is an explicit
//! repository call; there is no lazy relationship loading anywhere.

pub mod app;
pub mod membership;
pub mod property;
pub mod user;

pub use app::AppRepository;
pub use membership::MembershipRepository;
pub use property::PropertyRepository;
pub use user::UserRepository;
