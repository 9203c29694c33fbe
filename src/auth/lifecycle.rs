//! Credential lifecycle management.
//!
//! [`CredentialLifecycleManager`] is the only writer of stored OAuth
//! credentials. `ensure_valid` is the one operation the retrieval path
//! calls: it hands back an access token that is good right now,
//! refreshing and persisting behind the scenes.
//!
//! # Concurrency
//!
//! The manager does a read-then-conditional-write, not a transaction.
//! Two requests racing on the same expired credential may both call the
//! provider's refresh endpoint; the store's `upsert` is last-write-wins
//! on (owner, address) and both refreshed tokens are valid, so the
//! duplicate upstream call is an accepted inefficiency rather than a
//! correctness problem.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use super::{OAuthApiError, OAuthProviderClient};
use crate::domain::{OwnerId, TokenRecord};
use crate::stores::{CredentialStore, StoreError};

/// Refresh slightly ahead of expiry so a token never lapses mid-request.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Errors from credential validation.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No active credential is stored for this owner and address.
    /// Terminal until the owner completes authorization.
    #[error("no active credential registered for {address}")]
    NotRegistered {
        /// The address that has no usable credential.
        address: String,
    },

    /// The provider rejected the grant; the credential has been marked
    /// inactive. Terminal until re-authorization.
    #[error("credential revoked for {address}")]
    Revoked {
        /// The address whose grant was revoked.
        address: String,
    },

    /// The token endpoint failed transiently; nothing was deactivated.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    /// The durable store failed.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Obtains, validates, and refreshes OAuth credentials for
/// (owner, address) pairs.
pub struct CredentialLifecycleManager<C, P> {
    credentials: Arc<C>,
    provider: P,
    expiry_skew: Duration,
}

impl<C, P> CredentialLifecycleManager<C, P>
where
    C: CredentialStore,
    P: OAuthProviderClient,
{
    /// Creates a manager over a credential store and a provider client.
    pub fn new(credentials: Arc<C>, provider: P) -> Self {
        Self {
            credentials,
            provider,
            expiry_skew: Duration::seconds(EXPIRY_SKEW_SECS),
        }
    }

    /// Returns a token record whose access token is currently valid.
    ///
    /// Loads the stored credential, refreshes through the provider when
    /// the access token is at or past expiry, and persists the merged
    /// record when the access token rotated. The merge never drops a
    /// stored refresh token.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::NotRegistered`] when nothing usable is stored
    /// - [`CredentialError::Revoked`] when the provider rejects the
    ///   grant; the credential is deactivated as a side effect
    /// - [`CredentialError::Refresh`] for transient endpoint failures
    pub async fn ensure_valid(
        &self,
        owner_id: OwnerId,
        address: &str,
    ) -> Result<TokenRecord, CredentialError> {
        let credential = self
            .credentials
            .get(owner_id, address)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| CredentialError::NotRegistered {
                address: address.to_string(),
            })?;

        let stored = credential.token;
        if !stored.is_expired_at(Utc::now(), self.expiry_skew) {
            return Ok(stored);
        }

        let Some(refresh_token) = stored.refresh_token.clone() else {
            // Expired with no refresh token: nothing can revive this
            // grant short of re-authorization.
            self.credentials.deactivate(owner_id, address).await?;
            tracing::warn!(
                owner_id = %owner_id,
                address = %address,
                "expired credential has no refresh token; deactivated"
            );
            return Err(CredentialError::Revoked {
                address: address.to_string(),
            });
        };

        match self.provider.refresh(&refresh_token).await {
            Ok(fresh) => {
                let merged = fresh.merged_with_stored(Some(&stored));
                if merged.access_token != stored.access_token {
                    self.credentials.upsert(owner_id, address, &merged).await?;
                    tracing::info!(
                        owner_id = %owner_id,
                        address = %address,
                        "access token rotated and persisted"
                    );
                }
                Ok(merged)
            }
            Err(OAuthApiError::InvalidGrant(reason)) => {
                self.credentials.deactivate(owner_id, address).await?;
                tracing::warn!(
                    owner_id = %owner_id,
                    address = %address,
                    reason = %reason,
                    "refresh token rejected by provider; credential deactivated"
                );
                Err(CredentialError::Revoked {
                    address: address.to_string(),
                })
            }
            Err(e) => Err(CredentialError::Refresh(e.to_string())),
        }
    }
}
