//! Tenancy Core - Tenant Access Control Backend
//!
//! The access-control engine of a multi-tenant property-management backend:
//! the role lattice and tenancy graph, scope resolution, permission
//! decisions, the invitation lifecycle, and the SSO claim builder. CRUD
//! surfaces (campaigns, uploads, comments) live in collaborating services
//! and consume this crate's decisions.

pub mod api;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod email;
pub mod error;
pub mod jwt;
pub mod permission;
pub mod repository;
pub mod scope;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
