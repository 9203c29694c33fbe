//! Durable store collaborator interfaces.
//!
//! The core treats persistence as a key-value-by-owner-plus-address
//! store with read, upsert, and conditional-deactivate operations. No
//! transactions are assumed of the backend; the credential lifecycle
//! documents the refresh race that follows and how it is tolerated.
//!
//! The rusqlite implementation lives in [`crate::storage`]; tests
//! substitute in-memory maps.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AccountId, MailAccount, OAuthCredential, OwnerId, TokenRecord, TransportKind};

/// Errors surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed (connection, corruption, task failure).
    #[error("store backend error: {0}")]
    Backend(String),

    /// A uniqueness or integrity constraint was violated.
    #[error("constraint violated: {0}")]
    Conflict(String),

    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable storage for [`MailAccount`] rows.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// All accounts registered to an owner, newest first.
    async fn accounts_by_owner(&self, owner_id: OwnerId) -> Result<Vec<MailAccount>>;

    /// One account by owner, address, and transport kind.
    async fn account(
        &self,
        owner_id: OwnerId,
        address: &str,
        transport: TransportKind,
    ) -> Result<Option<MailAccount>>;

    /// One account by owner and id.
    async fn account_by_id(
        &self,
        owner_id: OwnerId,
        id: &AccountId,
    ) -> Result<Option<MailAccount>>;

    /// Active catch-all accounts whose address domain equals `domain`,
    /// ordered by creation time descending (newest registration first).
    async fn active_catch_all_by_domain(
        &self,
        owner_id: OwnerId,
        domain: &str,
    ) -> Result<Vec<MailAccount>>;

    /// Inserts a new account.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] when the owner already has an account
    /// with the same address and transport kind.
    async fn insert_account(&self, account: &MailAccount) -> Result<()>;

    /// Rewrites an existing account row.
    async fn update_account(&self, account: &MailAccount) -> Result<()>;

    /// Deletes an account, owner-scoped.
    async fn delete_account(&self, owner_id: OwnerId, id: &AccountId) -> Result<()>;
}

/// Durable storage for OAuth credentials, keyed by (owner, address).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored credential, active or not.
    async fn get(&self, owner_id: OwnerId, address: &str) -> Result<Option<OAuthCredential>>;

    /// Stores the token record for (owner, address) and marks the
    /// credential active, creating the row if needed. Last write wins;
    /// concurrent writers are not serialized here.
    async fn upsert(&self, owner_id: OwnerId, address: &str, token: &TokenRecord) -> Result<()>;

    /// Marks the credential inactive without deleting it, preserving
    /// token history for a later re-authorization.
    async fn deactivate(&self, owner_id: OwnerId, address: &str) -> Result<()>;
}
