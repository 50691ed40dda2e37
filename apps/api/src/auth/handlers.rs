use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::auth::identity::{IdentitySession, IdentityUser, SignInRequest, SignUpRequest};
use crate::auth::{bearer_token, AuthUser};
use crate::errors::AppError;
use crate::profiles::get_or_create_profile;
use crate::state::AppState;

#[derive(Serialize)]
pub struct OAuthRedirect {
    pub url: String,
}

impl From<&IdentityUser> for AuthUser {
    fn from(user: &IdentityUser) -> Self {
        AuthUser {
            user_id: user.id,
            email: user.email.clone().unwrap_or_default(),
            full_name: user.full_name(),
        }
    }
}

/// POST /api/v1/auth/signup
pub async fn handle_sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<IdentitySession>), AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let session = state.identity.sign_up(&req).await?;
    if let Some(user) = &session.user {
        get_or_create_profile(&state.db, &AuthUser::from(user)).await?;
    }
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/v1/auth/signin
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<IdentitySession>, AppError> {
    let session = state.identity.sign_in(&req).await?;
    if let Some(user) = &session.user {
        get_or_create_profile(&state.db, &AuthUser::from(user)).await?;
    }
    Ok(Json(session))
}

/// POST /api/v1/auth/signout
/// Drops the session analysis even if the provider call fails.
pub async fn handle_sign_out(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    if let Err(e) = state.cache.clear(user.user_id).await {
        warn!("Could not clear session analysis for {}: {e}", user.user_id);
    }

    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    state.identity.sign_out(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/oauth/:provider
pub async fn handle_oauth_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<OAuthRedirect>, AppError> {
    let url = state.identity.oauth_url(&provider.to_ascii_lowercase())?;
    Ok(Json(OAuthRedirect { url }))
}
