//! Credential validation against the external user endpoint.
//!
//! Security features:
//! - Local shape check: a credential that is not plain alphanumeric is
//!   refused before anything leaves the process
//! - Bounded validation round trip via the configured client timeout
//! - Failure detail stays in the logs; the wire only ever sees `status: false`

use crate::domain::config::AuthConfig;
use crate::domain::error::{AuthError, GatewayError};
use async_trait::async_trait;
use std::collections::HashMap;
use tally_types::{AuthenticatedUser, UserId};
use tracing::debug;

/// Resolves credentials to user identities.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Validates credentials against the configured HTTP user endpoint.
pub struct HttpAuthenticator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuthenticator {
    pub fn new(config: &AuthConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, credential: &str) -> Result<AuthenticatedUser, AuthError> {
        if !is_plain_credential(credential) {
            return Err(AuthError::MalformedCredential);
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("key", credential)])
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "validator rejected credential");
            return Err(AuthError::Rejected);
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        parse_user_payload(&payload)
    }
}

/// Credentials are plain ASCII alphanumerics, nothing else.
fn is_plain_credential(credential: &str) -> bool {
    !credential.is_empty() && credential.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn classify_transport(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::Transport(err.to_string())
    }
}

/// Extract the user identity from a validator response body.
///
/// Anything other than an object carrying a numeric `id` is malformed. An
/// optional `name` string is kept for the auth acknowledgement; all other
/// fields are ignored.
fn parse_user_payload(payload: &serde_json::Value) -> Result<AuthenticatedUser, AuthError> {
    let object = payload
        .as_object()
        .ok_or_else(|| AuthError::MalformedResponse("body is not an object".into()))?;

    let id = object
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| AuthError::MalformedResponse("missing numeric id".into()))?;

    let name = object.get("name").and_then(|v| v.as_str()).map(String::from);

    Ok(AuthenticatedUser {
        id: UserId(id),
        name,
    })
}

/// Table-backed authenticator for tests: known credentials resolve to fixed
/// users, everything else is rejected.
#[derive(Default)]
pub struct MockAuthenticator {
    users: HashMap<String, AuthenticatedUser>,
}

impl MockAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, credential: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.users.insert(credential.into(), user);
        self
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn authenticate(&self, credential: &str) -> Result<AuthenticatedUser, AuthError> {
        if !is_plain_credential(credential) {
            return Err(AuthError::MalformedCredential);
        }
        self.users
            .get(credential)
            .cloned()
            .ok_or(AuthError::Rejected)
    }
}
