//! OAuth provider client.
//!
//! Talks to the provider's token endpoint: authorization-code exchange
//! and refresh-token redemption. The one distinction that matters
//! downstream is `invalid_grant` (the grant is gone for good, the
//! credential must be deactivated) versus everything else (transient,
//! retry later).

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::OAuthSettings;
use crate::domain::{OwnerId, TokenRecord};

/// Errors from the provider's token endpoint.
#[derive(Debug, Error)]
pub enum OAuthApiError {
    /// The provider permanently rejected the grant (revoked or expired
    /// refresh token, consent withdrawn).
    #[error("grant rejected by provider: {0}")]
    InvalidGrant(String),

    /// The endpoint was unreachable.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other endpoint failure; safe to retry later.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Token endpoint operations the credential lifecycle depends on.
#[async_trait]
pub trait OAuthProviderClient: Send + Sync {
    /// Exchanges an authorization code for a token set.
    async fn exchange_code(&self, code: &str) -> Result<TokenRecord, OAuthApiError>;

    /// Mints a fresh access token from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, OAuthApiError>;
}

/// Wire format of a successful token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
}

/// Wire format of a token endpoint error body.
#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// HTTP implementation of [`OAuthProviderClient`].
pub struct HttpOAuthClient {
    client: reqwest::Client,
    settings: OAuthSettings,
}

impl HttpOAuthClient {
    /// Creates a client for the configured provider.
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenRecord, OAuthApiError> {
        let response = self
            .client
            .post(&self.settings.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| OAuthApiError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OAuthApiError::Connection(e.to_string()))?;

        if !status.is_success() {
            let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            if parsed.error.as_deref() == Some("invalid_grant") {
                return Err(OAuthApiError::InvalidGrant(
                    parsed.error_description.unwrap_or_else(|| body.clone()),
                ));
            }
            return Err(OAuthApiError::Provider(format!(
                "token endpoint error ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| OAuthApiError::Provider(format!("parse token response: {}", e)))?;

        Ok(TokenRecord {
            access_token: token.access_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            refresh_token: token.refresh_token,
            scope: token.scope,
            token_type: token.token_type,
        })
    }
}

#[async_trait]
impl OAuthProviderClient for HttpOAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenRecord, OAuthApiError> {
        self.token_request(&[
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, OAuthApiError> {
        self.token_request(&[
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}

/// Errors decoding a returned authorization state.
#[derive(Debug, Error)]
pub enum StateDecodeError {
    #[error("state is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("state payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// State round-tripped through the authorization redirect, identifying
/// which owner and address the returning code belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// Owner who initiated the authorization.
    pub owner_id: OwnerId,
    /// Mailbox address being authorized, lowercased.
    pub address: String,
}

impl AuthState {
    /// Encodes the state as unpadded base64url JSON.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        BASE64_URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a state value returned by the provider.
    pub fn decode(state: &str) -> Result<Self, StateDecodeError> {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(state.as_bytes())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builds the consent URL the owner is sent to.
///
/// Requests offline access with a forced consent prompt so the provider
/// issues a refresh token even on re-authorization.
pub fn build_authorization_url(
    settings: &OAuthSettings,
    state: &AuthState,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&settings.auth_url)?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", &settings.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &settings.scopes.join(" "))
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", &state.encode());
    Ok(url)
}
