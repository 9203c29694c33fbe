//! Mail account domain types.
//!
//! A [`MailAccount`] describes one mailbox the system can read for an
//! owner: either an OAuth webmail address (credentials tracked separately
//! as an [`OAuthCredential`](super::OAuthCredential)) or an IMAP mailbox
//! with stored connection parameters. A catch-all IMAP account serves
//! every alias under its address domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, OwnerId};

/// A mailbox account registered for an owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAccount {
    /// Unique identifier for this account.
    pub id: AccountId,
    /// Owner this account belongs to.
    pub owner_id: OwnerId,
    /// Mailbox address, stored lowercased.
    pub address: String,
    /// Which transport serves this mailbox.
    pub transport: TransportKind,
    /// Inactive accounts are never selected by provider resolution.
    pub active: bool,
    /// Whether this account serves every alias under its address domain.
    /// Only meaningful for IMAP accounts; requires `active`.
    pub catch_all: bool,
    /// IMAP connection parameters; `None` for OAuth accounts.
    pub imap: Option<ImapParams>,
    /// Registration time; newest wins when several catch-all accounts
    /// cover the same domain.
    pub created_at: DateTime<Utc>,
}

impl MailAccount {
    /// Returns the domain part of this account's address, if present.
    pub fn domain(&self) -> Option<&str> {
        address_domain(&self.address)
    }
}

/// Which transport serves a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// OAuth-authenticated webmail API.
    Oauth,
    /// Direct IMAP access with stored credentials.
    Imap,
}

impl TransportKind {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Oauth => "oauth",
            TransportKind::Imap => "imap",
        }
    }
}

/// Per-account IMAP connection parameters.
///
/// These are account-level, not process-level: two accounts may point at
/// different servers. The password is the stored mailbox credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapParams {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port (typically 993 for TLS).
    pub port: u16,
    /// Whether to use implicit TLS.
    pub use_tls: bool,
    /// Mailbox password or app-specific password.
    pub password: String,
}

/// Extracts the domain part of an address (`user@domain` -> `domain`).
///
/// Returns `None` when there is no single `@` separating two non-empty
/// parts; callers treat that as a malformed alias.
pub fn address_domain(address: &str) -> Option<&str> {
    let mut parts = address.splitn(2, '@');
    let local = parts.next()?;
    let domain = parts.next()?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(domain)
}
