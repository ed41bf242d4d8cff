//! Identity service client
//!
//! Thin boundary to the external identity service: account creation and
//! login, nothing else. Failures come back as human-readable messages and
//! are purely informational; there is no retry logic here.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimal user identity returned on successful signup/login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Opaque account id assigned by the identity service
    pub uid: String,
    /// Account email
    pub email: String,
}

/// Client for the external identity service.
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CredentialRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct IdentityResponse {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl IdentityClient {
    /// Create a client for the configured identity service.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.identity_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a new account.
    pub async fn signup(&self, email: &str, password: &str) -> AuthResult<UserIdentity> {
        self.submit("signup", email, password).await
    }

    /// Sign in to an existing account.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<UserIdentity> {
        self.submit("login", email, password).await
    }

    async fn submit(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<UserIdentity> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, %email, "Submitting credentials to identity service");

        let resp = self
            .http
            .post(&url)
            .json(&CredentialRequest { email, password })
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        interpret_response(status, &body)
    }
}

/// Map an identity service response onto an identity or a displayable error.
fn interpret_response(status: u16, body: &str) -> AuthResult<UserIdentity> {
    if !(200..300).contains(&status) {
        let message = if body.trim().is_empty() {
            format!("Identity service returned status {status}")
        } else {
            // Some deployments put the message in a JSON error field,
            // others send it bare
            serde_json::from_str::<IdentityResponse>(body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| body.trim().to_string())
        };
        return Err(AuthError::Rejected { message });
    }

    let data: IdentityResponse = serde_json::from_str(body)
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    if let Some(message) = data.error {
        return Err(AuthError::Rejected { message });
    }

    match (data.uid, data.email) {
        (Some(uid), Some(email)) => Ok(UserIdentity { uid, email }),
        _ => Err(AuthError::MalformedResponse(
            "response missing uid or email".to_string(),
        )),
    }
}
