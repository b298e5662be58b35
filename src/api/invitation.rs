//! Invitation acceptance handler
//!
//! Unauthenticated by design: the token itself is the credential. The error
//! body is the bare `{"error": ...}` shape remote clients already parse.

use crate::error::AppError;
use crate::state::HasInvitations;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Body of a successful acceptance
#[derive(Debug, Serialize)]
pub struct AcceptInvitationResponse {
    pub message: String,
    pub user: AcceptedUser,
}

#[derive(Debug, Serialize)]
pub struct AcceptedUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
struct AcceptInvitationError {
    error: String,
}

/// Accept an invitation, activating the account.
pub async fn accept<S: HasInvitations>(
    State(state): State<S>,
    Path(token): Path<String>,
) -> Response {
    match state.invitation_service().redeem(&token).await {
        Ok(user) => (
            StatusCode::OK,
            Json(AcceptInvitationResponse {
                message: "Invitation accepted successfully! Your account has been activated."
                    .to_string(),
                user: AcceptedUser {
                    id: user.id,
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    is_active: user.is_active,
                },
            }),
        )
            .into_response(),
        Err(AppError::BadRequest(error)) => (
            StatusCode::BAD_REQUEST,
            Json(AcceptInvitationError { error }),
        )
            .into_response(),
        Err(other) => other.into_response(),
    }
}
