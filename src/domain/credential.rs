//! OAuth credential domain types.
//!
//! Tokens are stored as a fully-typed [`TokenRecord`] rather than a loose
//! JSON blob. The merge rule matters: an upstream refresh response often
//! omits the refresh token, and the stored one must survive — losing it
//! would force the owner through authorization again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OwnerId;

/// A typed OAuth token set as returned by the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token presented to the mailbox API.
    pub access_token: String,
    /// When the access token stops being accepted, if the provider said.
    pub expires_at: Option<DateTime<Utc>>,
    /// Long-lived token used to mint new access tokens.
    pub refresh_token: Option<String>,
    /// Granted scopes, space-separated.
    pub scope: Option<String>,
    /// Token type as reported by the provider (normally `Bearer`).
    pub token_type: Option<String>,
}

impl TokenRecord {
    /// Whether the access token should be treated as expired at `now`.
    ///
    /// `skew` widens the check so a token about to lapse mid-request is
    /// refreshed up front. A record without an expiry is treated as
    /// expired: the only way to validate it is to refresh.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + skew,
            None => true,
        }
    }

    /// Merges a fresh token response with the previously stored record.
    ///
    /// Invariant: a refresh token, once known, is never dropped. If the
    /// fresh response omits one, the stored value is carried forward.
    pub fn merged_with_stored(mut self, stored: Option<&TokenRecord>) -> TokenRecord {
        if self.refresh_token.is_none() {
            self.refresh_token = stored.and_then(|t| t.refresh_token.clone());
        }
        self
    }
}

/// A stored OAuth credential, owned by exactly one (owner, address) pair.
///
/// Marked inactive, never deleted, when the provider permanently rejects
/// the grant; history survives re-authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredential {
    /// Owner the credential belongs to.
    pub owner_id: OwnerId,
    /// Mailbox address the grant covers, lowercased.
    pub address: String,
    /// The current token set.
    pub token: TokenRecord,
    /// Cleared when the upstream provider rejects the refresh token.
    pub active: bool,
    /// Last persisted change.
    pub updated_at: DateTime<Utc>,
}
