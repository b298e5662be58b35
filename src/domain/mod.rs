//! Domain models

pub mod app;
pub mod membership;
pub mod property;
pub mod role;
pub mod user;

pub use app::{App, AppRef};
pub use membership::{Membership, MembershipInfo, MembershipScope};
pub use property::{
    CreatePropertyGroupInput, CreatePropertyInput, GroupRef, Property, PropertyGroup,
    PropertyWithGroup,
};
pub use role::Role;
pub use user::{
    AssignRoleInput, CreateUserInput, InvitationState, UpdateUserInput, User, UserResponse,
    UserStats,
};
