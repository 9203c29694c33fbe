//! Backend resolution for an alias.
//!
//! Given an owner, an alias, and a platform, decides which backend
//! services the request. The precedence is fixed and evaluated in order,
//! first match wins:
//!
//! 1. the alias lives under the OAuth provider's address domain and an
//!    active credential is stored for it
//! 2. a dedicated (non-catch-all) active IMAP account exists for the
//!    alias itself
//! 3. an active catch-all IMAP account covers the alias's domain; the
//!    most recently registered one wins, since the newest registration
//!    reflects the operator's latest intent
//! 4. nothing resolves
//!
//! Resolution is pure reads; it never mutates the stores.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{address_domain, MailAccount, OwnerId, TransportKind};
use crate::stores::{AccountStore, CredentialStore, StoreError};

/// The backend selected to service one retrieval.
///
/// Downstream code matches exhaustively on this; there are no string
/// flags to compare.
#[derive(Debug, Clone)]
pub enum BackendDescriptor {
    /// The OAuth webmail mailbox at this address.
    Oauth {
        /// The mailbox address, equal to the alias.
        address: String,
    },
    /// A dedicated IMAP account registered for the alias itself.
    Imap {
        /// The resolved account, including connection parameters.
        account: MailAccount,
    },
    /// A catch-all IMAP account serving the alias's whole domain.
    CatchAll {
        /// The resolved catch-all account.
        account: MailAccount,
    },
}

/// Errors from backend resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The alias has no domain part; rejected before any store access.
    #[error("alias has no domain part: {0}")]
    BadAlias(String),

    /// No backend resolves for this owner and alias. Deliberately
    /// carries no detail about which rule came closest; the boundary
    /// layer phrases the generic message.
    #[error("no provider configured for this alias")]
    NoProvider,

    /// The durable store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Applies the backend precedence rules for an owner's alias.
pub struct ProviderResolver<A, C> {
    accounts: Arc<A>,
    credentials: Arc<C>,
    oauth_address_domain: String,
}

impl<A, C> ProviderResolver<A, C>
where
    A: AccountStore,
    C: CredentialStore,
{
    /// Creates a resolver over the two stores.
    ///
    /// `oauth_address_domain` is the public webmail domain whose aliases
    /// are eligible for the OAuth backend (rule 1).
    pub fn new(accounts: Arc<A>, credentials: Arc<C>, oauth_address_domain: impl Into<String>) -> Self {
        Self {
            accounts,
            credentials,
            oauth_address_domain: oauth_address_domain.into().to_lowercase(),
        }
    }

    /// Resolves the backend for `alias`, applying the precedence rules.
    ///
    /// Expects `alias` and `platform` already normalized (trimmed,
    /// lowercased) by the caller.
    pub async fn resolve(
        &self,
        owner_id: OwnerId,
        alias: &str,
        platform: &str,
    ) -> Result<BackendDescriptor, ResolveError> {
        let domain = address_domain(alias)
            .ok_or_else(|| ResolveError::BadAlias(alias.to_string()))?;

        // Rule 1: OAuth-domain alias with an active stored credential.
        if domain == self.oauth_address_domain {
            if let Some(credential) = self.credentials.get(owner_id, alias).await? {
                if credential.active {
                    tracing::debug!(owner_id = %owner_id, %alias, %platform, "resolved OAuth backend");
                    return Ok(BackendDescriptor::Oauth {
                        address: alias.to_string(),
                    });
                }
            }
        }

        // Rule 2: a dedicated IMAP account for the alias itself.
        if let Some(account) = self
            .accounts
            .account(owner_id, alias, TransportKind::Imap)
            .await?
        {
            if account.active && !account.catch_all {
                tracing::debug!(owner_id = %owner_id, %alias, %platform, "resolved dedicated IMAP backend");
                return Ok(BackendDescriptor::Imap { account });
            }
        }

        // Rule 3: newest active catch-all covering the alias's domain.
        let candidates = self
            .accounts
            .active_catch_all_by_domain(owner_id, domain)
            .await?;
        if let Some(account) = candidates.into_iter().next() {
            tracing::debug!(owner_id = %owner_id, %alias, %platform, catch_all = %account.address, "resolved catch-all backend");
            return Ok(BackendDescriptor::CatchAll { account });
        }

        Err(ResolveError::NoProvider)
    }
}
