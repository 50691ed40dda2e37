pub mod handlers;
pub mod identity;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

pub const TOKEN_AUDIENCE: &str = "authenticated";

/// Session token claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub aud: String,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<Value>,
}

/// The caller, resolved from a bearer token. Every `/api/v1` route except
/// auth, packages, and health takes one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
        let full_name = claims
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("full_name").or_else(|| m.get("name")))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(AuthUser {
            user_id,
            email: claims.email.unwrap_or_default(),
            full_name,
        })
    }
}

/// HS256 with the shared secret; expiry and audience are enforced.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        warn!("Token verification failed: {e}");
        AppError::Unauthorized
    })?;

    AuthUser::try_from(data.claims)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        verify_token(token, &state.config.jwt_secret)
    }
}
