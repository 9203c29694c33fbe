//! rusqlite-backed implementation of the store collaborators.
//!
//! [`StorageLayer`] owns the SQLite database and implements both
//! [`AccountStore`] and [`CredentialStore`]. All SQLite work runs via
//! `tokio::task::spawn_blocking` behind the [`Database`] wrapper.

mod database;
pub mod queries;
mod schema;

pub use database::{Database, DatabaseError, Result};

use async_trait::async_trait;
use rusqlite::ErrorCode;

use crate::domain::{AccountId, MailAccount, OAuthCredential, OwnerId, TokenRecord, TransportKind};
use crate::stores::{AccountStore, CredentialStore, StoreError};

/// Durable storage for accounts and credentials.
#[derive(Clone)]
pub struct StorageLayer {
    db: Database,
}

impl StorageLayer {
    /// Opens the storage layer at the given database path.
    pub async fn new(db_path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = Database::open(db_path).await?;
        Ok(Self { db })
    }

    /// Opens an in-memory storage layer for testing.
    pub async fn in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self { db })
    }

    /// Returns a reference to the underlying database.
    pub fn db(&self) -> &Database {
        &self.db
    }
}

fn map_db_error(e: DatabaseError) -> StoreError {
    match &e {
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(inner, _))
            if inner.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

#[async_trait]
impl AccountStore for StorageLayer {
    async fn accounts_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> std::result::Result<Vec<MailAccount>, StoreError> {
        queries::accounts::by_owner(&self.db, owner_id)
            .await
            .map_err(map_db_error)
    }

    async fn account(
        &self,
        owner_id: OwnerId,
        address: &str,
        transport: TransportKind,
    ) -> std::result::Result<Option<MailAccount>, StoreError> {
        queries::accounts::get(&self.db, owner_id, address, transport)
            .await
            .map_err(map_db_error)
    }

    async fn account_by_id(
        &self,
        owner_id: OwnerId,
        id: &AccountId,
    ) -> std::result::Result<Option<MailAccount>, StoreError> {
        queries::accounts::get_by_id(&self.db, owner_id, id)
            .await
            .map_err(map_db_error)
    }

    async fn active_catch_all_by_domain(
        &self,
        owner_id: OwnerId,
        domain: &str,
    ) -> std::result::Result<Vec<MailAccount>, StoreError> {
        queries::accounts::active_catch_all_by_domain(&self.db, owner_id, domain)
            .await
            .map_err(map_db_error)
    }

    async fn insert_account(&self, account: &MailAccount) -> std::result::Result<(), StoreError> {
        queries::accounts::insert(&self.db, account)
            .await
            .map_err(map_db_error)
    }

    async fn update_account(&self, account: &MailAccount) -> std::result::Result<(), StoreError> {
        queries::accounts::update(&self.db, account)
            .await
            .map_err(map_db_error)
    }

    async fn delete_account(
        &self,
        owner_id: OwnerId,
        id: &AccountId,
    ) -> std::result::Result<(), StoreError> {
        queries::accounts::delete(&self.db, owner_id, id)
            .await
            .map_err(map_db_error)
    }
}

#[async_trait]
impl CredentialStore for StorageLayer {
    async fn get(
        &self,
        owner_id: OwnerId,
        address: &str,
    ) -> std::result::Result<Option<OAuthCredential>, StoreError> {
        queries::credentials::get(&self.db, owner_id, address)
            .await
            .map_err(map_db_error)
    }

    async fn upsert(
        &self,
        owner_id: OwnerId,
        address: &str,
        token: &TokenRecord,
    ) -> std::result::Result<(), StoreError> {
        queries::credentials::upsert(&self.db, owner_id, address, token)
            .await
            .map_err(map_db_error)
    }

    async fn deactivate(
        &self,
        owner_id: OwnerId,
        address: &str,
    ) -> std::result::Result<(), StoreError> {
        queries::credentials::deactivate(&self.db, owner_id, address)
            .await
            .map_err(map_db_error)
    }
}
