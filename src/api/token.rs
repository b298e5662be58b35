//! SSO token endpoints

use crate::domain::AppRef;
use crate::error::{AppError, Result};
use crate::state::HasSso;
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

/// Request body for obtaining a token pair
#[derive(Debug, Clone, Deserialize)]
pub struct ObtainTokenRequest {
    pub email: String,
    pub password: String,
    pub app_id: Option<Uuid>,
    pub app_slug: Option<String>,
}

impl ObtainTokenRequest {
    fn app_ref(&self) -> Option<AppRef> {
        if let Some(id) = self.app_id {
            Some(AppRef::Id(id))
        } else {
            self.app_slug.clone().map(AppRef::Slug)
        }
    }
}

/// Obtain access + refresh tokens with embedded claims.
pub async fn obtain<S: HasSso>(
    State(state): State<S>,
    Json(request): Json<ObtainTokenRequest>,
) -> Result<impl IntoResponse> {
    let pair = state
        .sso_service()
        .obtain_token(&request.email, &request.password, request.app_ref())
        .await?;

    Ok(Json(pair))
}

/// Recompute claims for the presented bearer token.
pub async fn introspect<S: HasSso>(
    State(state): State<S>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state.sso_service().introspect(token).await?;

    Ok(Json(claims))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
