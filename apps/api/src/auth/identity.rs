//! Thin proxy over the identity provider's auth REST API (GoTrue-compatible).
//! Token verification is local (see `verify_token`); this client is only used
//! for the account lifecycle calls.

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

pub const OAUTH_PROVIDERS: &[&str] = &["google", "github", "linkedin_oidc"];

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("identity provider returned an unreadable response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported OAuth provider: {0}")]
    UnsupportedProvider(String),
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidCredentials => AppError::Unauthorized,
            IdentityError::Rejected { status, message } if (400..500).contains(&status) => {
                AppError::Validation(message)
            }
            IdentityError::UnsupportedProvider(provider) => {
                AppError::Validation(format!("Unsupported OAuth provider: {provider}"))
            }
            other => AppError::Identity(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<Value>,
}

impl IdentityUser {
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .as_ref()
            .and_then(|m| m.get("full_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// A session as returned to the browser. Signup without auto-confirm yields a
/// user but no tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySession {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user: Option<IdentityUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    anon_key: String,
    redirect_url: Option<String>,
}

impl IdentityClient {
    pub fn new(
        base_url: String,
        anon_key: String,
        redirect_url: Option<String>,
    ) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url,
            anon_key,
            redirect_url,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    pub async fn sign_up(&self, req: &SignUpRequest) -> Result<IdentitySession, IdentityError> {
        let mut body = json!({
            "email": req.email.trim(),
            "password": req.password,
            "data": {
                "full_name": req.full_name,
                "phone": req.phone,
            }
        });
        if let Some(phone) = req.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            body["phone"] = json!(phone.trim());
        }

        let response = self
            .client
            .post(self.url("/signup"))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let value = read_value(response).await?;
        let session = parse_signup(value)?;

        if let Some(user) = &session.user {
            info!("Signed up user {}", user.id);
        }
        Ok(session)
    }

    pub async fn sign_in(&self, req: &SignInRequest) -> Result<IdentitySession, IdentityError> {
        let response = self
            .client
            .post(self.url("/token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": req.email.trim(), "password": req.password }))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            warn!("Sign in rejected for {}", req.email.trim());
            return Err(IdentityError::InvalidCredentials);
        }

        let value = read_value(response).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Revokes the session behind `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.url("/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(())
    }

    /// Browser redirect target for an OAuth sign in.
    pub fn oauth_url(&self, provider: &str) -> Result<String, IdentityError> {
        if !OAUTH_PROVIDERS.contains(&provider) {
            return Err(IdentityError::UnsupportedProvider(provider.to_string()));
        }

        let mut params = vec![("provider", provider)];
        if let Some(redirect) = self.redirect_url.as_deref() {
            params.push(("redirect_to", redirect));
        }

        let url = Url::parse_with_params(&self.url("/authorize"), &params).map_err(|e| {
            IdentityError::Rejected {
                status: 500,
                message: format!("invalid authorize URL: {e}"),
            }
        })?;
        Ok(url.to_string())
    }
}

async fn read_value(response: reqwest::Response) -> Result<Value, IdentityError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!("Identity provider returned {status}: {body}");
        return Err(IdentityError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    Ok(serde_json::from_str(&body)?)
}

fn parse_signup(value: Value) -> Result<IdentitySession, IdentityError> {
    if value.get("access_token").is_some() || value.get("user").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    let user: IdentityUser = serde_json::from_value(value)?;
    Ok(IdentitySession {
        user: Some(user),
        ..IdentitySession::default()
    })
}

/// GoTrue reports errors under a handful of keys depending on the endpoint.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Authentication request failed".to_string()
            } else {
                body.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(redirect: Option<&str>) -> IdentityClient {
        IdentityClient::new(
            "http://localhost:9999/auth/v1".to_string(),
            "anon".to_string(),
            redirect.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn test_oauth_url_encodes_redirect() {
        let url = client(Some("https://app.example.com/auth/callback"))
            .oauth_url("google")
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:9999/auth/v1/authorize?provider=google&redirect_to=https%3A%2F%2Fapp.example.com%2Fauth%2Fcallback"
        );
    }

    #[test]
    fn test_oauth_rejects_unknown_provider() {
        let err = client(None).oauth_url("myspace").unwrap_err();
        assert!(matches!(
            AppError::from(err),
            AppError::Validation(m) if m.contains("myspace")
        ));
    }

    #[test]
    fn test_signup_without_session_yields_user_only() {
        let id = Uuid::new_v4();
        let session = parse_signup(json!({
            "id": id,
            "email": "asha@example.com",
            "user_metadata": { "full_name": "Asha Rao" }
        }))
        .unwrap();
        assert!(session.access_token.is_none());
        let user = session.user.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.full_name().as_deref(), Some("Asha Rao"));
    }

    #[test]
    fn test_signup_with_session() {
        let id = Uuid::new_v4();
        let session = parse_signup(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "id": id }
        }))
        .unwrap();
        assert_eq!(session.access_token.as_deref(), Some("jwt"));
        assert_eq!(session.user.unwrap().id, id);
    }

    #[test]
    fn test_error_message_keys() {
        assert_eq!(
            error_message(r#"{"msg": "User already registered"}"#),
            "User already registered"
        );
        assert_eq!(
            error_message(r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(""), "Authentication request failed");
    }

    #[test]
    fn test_client_errors_map_to_validation() {
        let err: AppError = IdentityError::Rejected {
            status: 422,
            message: "Password should be at least 6 characters".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = IdentityError::Rejected {
            status: 503,
            message: "down".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::Identity(_)));
        assert!(matches!(
            AppError::from(IdentityError::InvalidCredentials),
            AppError::Unauthorized
        ));
    }
}
