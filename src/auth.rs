//! Identity resolution, delegated to the external provider.
//!
//! The contract is a capability: given a bearer token, resolve it to
//! `{identity, display_name}` or fail. Nothing here issues or refreshes
//! tokens; the client obtains them from the identity provider directly.

use std::{sync::Arc, time::Duration};

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{error::AppError, model::AuthUser, state::AppState};

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    users: Vec<VerifiedUser>,
}

#[derive(Deserialize)]
struct VerifiedUser {
    #[serde(default)]
    email: String,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
}

pub struct IdentityVerifier {
    http: Client,
    verify_url: String,
}

impl IdentityVerifier {
    pub fn new(verify_url: &str, timeout_ms: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("HTTP client misconfigured!");

        Self {
            http,
            verify_url: verify_url.to_string(),
        }
    }

    /// Resolves a bearer token against the identity provider. Any
    /// failure, including provider errors, reads as `Unauthorized`; a
    /// caller that cannot be identified gets no further detail.
    pub async fn verify(&self, token: &str) -> Result<AuthUser, AppError> {
        if self.verify_url.is_empty() {
            warn!("AUTH_VERIFY_URL not configured, rejecting all tokens");
            return Err(AppError::Unauthorized);
        }

        let response = self
            .http
            .post(&self.verify_url)
            .json(&json!({ "idToken": token }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("Token verification failed: {e}");
                AppError::Unauthorized
            })?;

        let body: VerifyResponse = response.json().await.map_err(|e| {
            warn!("Unreadable verifier response: {e}");
            AppError::Unauthorized
        })?;

        let user = body.users.into_iter().next().ok_or(AppError::Unauthorized)?;
        if user.email.is_empty() {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser {
            display_name: display_name_for(&user),
            identity: user.email,
        })
    }
}

/// Providers often leave the display name unset; fall back to the local
/// part of the email like the UI does.
fn display_name_for(user: &VerifiedUser) -> String {
    match &user.display_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => user
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        state.verifier.verify(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let user = VerifiedUser {
            email: "ana.souza@x.com".to_string(),
            display_name: None,
        };
        assert_eq!(display_name_for(&user), "ana.souza");

        let user = VerifiedUser {
            email: "ana.souza@x.com".to_string(),
            display_name: Some("Ana".to_string()),
        };
        assert_eq!(display_name_for(&user), "Ana");

        let user = VerifiedUser {
            email: "ana.souza@x.com".to_string(),
            display_name: Some(String::new()),
        };
        assert_eq!(display_name_for(&user), "ana.souza");
    }

    #[test]
    fn test_verifier_response_shape() {
        let body: VerifyResponse = serde_json::from_str(
            r#"{"users": [{"email": "a@x.com", "displayName": "A", "localId": "u1"}]}"#,
        )
        .unwrap();

        assert_eq!(body.users.len(), 1);
        assert_eq!(body.users[0].email, "a@x.com");
    }
}
