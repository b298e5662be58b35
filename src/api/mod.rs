//! HTTP wire contracts
//!
//! Only the surfaces this core exposes to its collaborators: unauthenticated
//! invitation acceptance, token obtain, and introspection. Handlers are
//! generic over the state traits in [`crate::state`].

pub mod invitation;
pub mod token;

use crate::state::{HasInvitations, HasSso};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the router over any conforming state.
pub fn routes<S>(state: S) -> Router
where
    S: HasInvitations + HasSso,
{
    Router::new()
        .route("/accept-invitation/{token}", get(invitation::accept::<S>))
        .route("/auth/token", post(token::obtain::<S>))
        .route("/auth/introspect", get(token::introspect::<S>))
        .with_state(state)
}
