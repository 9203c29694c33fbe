//! Account registration and maintenance.
//!
//! Owner-scoped operations on mailbox accounts: registering IMAP
//! accounts (dedicated or catch-all), toggling the active and catch-all
//! flags under their invariants, updating connection parameters, and
//! running the OAuth authorization handshake for webmail addresses.
//!
//! Two rules keep resolution coherent:
//!
//! - deactivating an account also clears its catch-all flag
//! - an account must be active to be marked catch-all

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use url::Url;

use crate::auth::{build_authorization_url, AuthState, OAuthProviderClient, StateDecodeError};
use crate::config::OAuthSettings;
use crate::domain::{address_domain, AccountId, ImapParams, MailAccount, OwnerId, TransportKind};
use crate::stores::{AccountStore, CredentialStore, StoreError};

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// A parameter failed validation.
    #[error("invalid account parameters: {0}")]
    Invalid(String),

    /// The owner already has an account for this address and transport.
    #[error("account already registered: {0}")]
    AlreadyExists(String),

    /// No such account for this owner.
    #[error("account not found")]
    NotFound,

    /// Catch-all requires the account to be active.
    #[error("account must be active to serve as catch-all")]
    InactiveCatchAll,

    /// The returned authorization state could not be decoded.
    #[error("authorization state invalid: {0}")]
    BadState(#[from] StateDecodeError),

    /// The provider refused the authorization code.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The configured authorization endpoint is not a valid URL.
    #[error("authorization url: {0}")]
    AuthUrl(#[from] url::ParseError),

    /// The durable store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for account operations.
pub type AccountResult<T> = Result<T, AccountError>;

/// Request to register an IMAP account.
#[derive(Debug, Clone)]
pub struct RegisterImapAccount {
    /// Mailbox address; also the IMAP login name.
    pub address: String,
    /// Mailbox password.
    pub password: String,
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port.
    pub port: u16,
    /// Whether to use implicit TLS.
    pub use_tls: bool,
    /// Register directly as the domain's catch-all.
    pub catch_all: bool,
}

impl RegisterImapAccount {
    /// Creates a registration request with the usual TLS defaults.
    pub fn new(
        address: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            host: host.into(),
            port: 993,
            use_tls: true,
            catch_all: false,
        }
    }

    /// Overrides the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the TLS flag.
    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Registers the account as its domain's catch-all.
    pub fn catch_all(mut self, catch_all: bool) -> Self {
        self.catch_all = catch_all;
        self
    }
}

/// Partial update of an IMAP account's connection parameters.
#[derive(Debug, Clone, Default)]
pub struct ImapAccountUpdate {
    /// New password.
    pub password: Option<String>,
    /// New server hostname.
    pub host: Option<String>,
    /// New server port.
    pub port: Option<u16>,
    /// New TLS flag.
    pub use_tls: Option<bool>,
}

impl ImapAccountUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the TLS flag.
    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = Some(use_tls);
        self
    }

    /// Returns true when nothing would change.
    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && self.use_tls.is_none()
    }
}

/// Service for owner-scoped account maintenance.
pub struct AccountService<A, C, P> {
    accounts: Arc<A>,
    credentials: Arc<C>,
    provider: P,
    oauth: OAuthSettings,
}

impl<A, C, P> AccountService<A, C, P>
where
    A: AccountStore,
    C: CredentialStore,
    P: OAuthProviderClient,
{
    /// Creates the service over its stores and the OAuth provider client.
    pub fn new(accounts: Arc<A>, credentials: Arc<C>, provider: P, oauth: OAuthSettings) -> Self {
        Self {
            accounts,
            credentials,
            provider,
            oauth,
        }
    }

    /// Registers a new IMAP account for the owner.
    ///
    /// The address is normalized (trimmed, lowercased) and must carry a
    /// domain part. One account per (owner, address) of a transport
    /// kind; a second registration fails with
    /// [`AccountError::AlreadyExists`].
    pub async fn register_imap_account(
        &self,
        owner_id: OwnerId,
        request: RegisterImapAccount,
    ) -> AccountResult<MailAccount> {
        let address = request.address.trim().to_lowercase();
        if address_domain(&address).is_none() {
            return Err(AccountError::Invalid(format!(
                "address must include a domain: {}",
                address
            )));
        }

        let password = request.password.trim().to_string();
        if password.is_empty() {
            return Err(AccountError::Invalid("password is required".to_string()));
        }

        let host = request.host.trim().to_lowercase();
        if host.is_empty() {
            return Err(AccountError::Invalid("imap host is required".to_string()));
        }
        if request.port == 0 {
            return Err(AccountError::Invalid("imap port is invalid".to_string()));
        }

        if self
            .accounts
            .account(owner_id, &address, TransportKind::Imap)
            .await?
            .is_some()
        {
            return Err(AccountError::AlreadyExists(address));
        }

        let account = MailAccount {
            id: AccountId::from(format!("account-{}", uuid::Uuid::new_v4())),
            owner_id,
            address,
            transport: TransportKind::Imap,
            active: true,
            catch_all: request.catch_all,
            imap: Some(ImapParams {
                host,
                port: request.port,
                use_tls: request.use_tls,
                password,
            }),
            created_at: Utc::now(),
        };

        self.accounts.insert_account(&account).await?;
        tracing::info!(
            owner_id = %owner_id,
            address = %account.address,
            catch_all = account.catch_all,
            "IMAP account registered"
        );

        Ok(account)
    }

    /// Lists the owner's accounts, newest first.
    pub async fn list_accounts(&self, owner_id: OwnerId) -> AccountResult<Vec<MailAccount>> {
        Ok(self.accounts.accounts_by_owner(owner_id).await?)
    }

    /// Updates an IMAP account's connection parameters.
    pub async fn update_imap_account(
        &self,
        owner_id: OwnerId,
        id: &AccountId,
        update: ImapAccountUpdate,
    ) -> AccountResult<MailAccount> {
        let mut account = self.get_owned(owner_id, id).await?;
        if update.is_empty() {
            return Ok(account);
        }

        let Some(mut params) = account.imap.take() else {
            return Err(AccountError::Invalid("not an IMAP account".to_string()));
        };

        if let Some(password) = update.password {
            let password = password.trim().to_string();
            if password.is_empty() {
                return Err(AccountError::Invalid(
                    "password cannot be empty".to_string(),
                ));
            }
            params.password = password;
        }
        if let Some(host) = update.host {
            let host = host.trim().to_lowercase();
            if host.is_empty() {
                return Err(AccountError::Invalid(
                    "imap host cannot be empty".to_string(),
                ));
            }
            params.host = host;
        }
        if let Some(port) = update.port {
            if port == 0 {
                return Err(AccountError::Invalid("imap port is invalid".to_string()));
            }
            params.port = port;
        }
        if let Some(use_tls) = update.use_tls {
            params.use_tls = use_tls;
        }

        account.imap = Some(params);
        self.accounts.update_account(&account).await?;

        Ok(account)
    }

    /// Activates or deactivates an account.
    ///
    /// Deactivation also clears the catch-all flag so a dormant account
    /// can never keep serving a whole domain.
    pub async fn set_account_active(
        &self,
        owner_id: OwnerId,
        id: &AccountId,
        active: bool,
    ) -> AccountResult<MailAccount> {
        let mut account = self.get_owned(owner_id, id).await?;

        account.active = active;
        if !active {
            account.catch_all = false;
        }

        self.accounts.update_account(&account).await?;
        tracing::info!(
            owner_id = %owner_id,
            address = %account.address,
            active,
            "account active flag changed"
        );

        Ok(account)
    }

    /// Marks or unmarks an account as its domain's catch-all.
    ///
    /// # Errors
    ///
    /// [`AccountError::InactiveCatchAll`] when enabling catch-all on an
    /// inactive account.
    pub async fn set_catch_all(
        &self,
        owner_id: OwnerId,
        id: &AccountId,
        catch_all: bool,
    ) -> AccountResult<MailAccount> {
        let mut account = self.get_owned(owner_id, id).await?;

        if catch_all && !account.active {
            return Err(AccountError::InactiveCatchAll);
        }

        account.catch_all = catch_all;
        self.accounts.update_account(&account).await?;

        Ok(account)
    }

    /// Deletes an owner's account.
    pub async fn delete_account(&self, owner_id: OwnerId, id: &AccountId) -> AccountResult<()> {
        let account = self.get_owned(owner_id, id).await?;
        self.accounts.delete_account(owner_id, id).await?;
        tracing::info!(owner_id = %owner_id, address = %account.address, "account deleted");
        Ok(())
    }

    /// Builds the consent URL that starts authorization of an OAuth
    /// webmail address for this owner.
    pub fn begin_authorization(&self, owner_id: OwnerId, address: &str) -> AccountResult<Url> {
        let address = address.trim().to_lowercase();
        if address_domain(&address).is_none() {
            return Err(AccountError::Invalid(format!(
                "address must include a domain: {}",
                address
            )));
        }

        let state = AuthState { owner_id, address };
        Ok(build_authorization_url(&self.oauth, &state)?)
    }

    /// Completes authorization with the code and state returned by the
    /// provider, storing the merged token set.
    ///
    /// A re-authorization merges with any previously stored record so a
    /// refresh token is never lost, and reactivates the credential.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
    ) -> AccountResult<AuthState> {
        let state = AuthState::decode(state)?;

        let fresh = self
            .provider
            .exchange_code(code)
            .await
            .map_err(|e| AccountError::Authorization(e.to_string()))?;

        let stored = self
            .credentials
            .get(state.owner_id, &state.address)
            .await?
            .map(|c| c.token);
        let merged = fresh.merged_with_stored(stored.as_ref());

        self.credentials
            .upsert(state.owner_id, &state.address, &merged)
            .await?;

        tracing::info!(
            owner_id = %state.owner_id,
            address = %state.address,
            "authorization completed"
        );
        Ok(state)
    }

    async fn get_owned(&self, owner_id: OwnerId, id: &AccountId) -> AccountResult<MailAccount> {
        self.accounts
            .account_by_id(owner_id, id)
            .await?
            .ok_or(AccountError::NotFound)
    }
}
