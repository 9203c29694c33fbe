//! Mailbox transport trait definitions.
//!
//! A transport opens a session to one mailbox and yields raw messages
//! newer than a cutoff. Two implementations exist: the OAuth webmail API
//! ([`OAuthTransport`](super::OAuthTransport)) and direct IMAP
//! ([`ImapTransport`](super::ImapTransport)). The orchestrator only sees
//! these traits, which keeps retrieval testable against scripted
//! mailboxes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ImapParams;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while talking to a mailbox.
///
/// All variants are transient from the account's point of view: a
/// transport failure never deactivates an account. Only a permanent
/// credential rejection (handled by the credential lifecycle layer)
/// does that.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The mailbox rejected the presented credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network or connection failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation exceeded its configured bound.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The mailbox answered with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Raw RFC 5322 message bytes as handed back by a transport.
#[derive(Debug, Clone)]
pub struct RawMessage {
    bytes: Vec<u8>,
}

impl RawMessage {
    /// Wraps raw message bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The undecoded message bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A mailbox reachable through one backend.
#[async_trait]
pub trait MailboxTransport: Send + Sync {
    /// Opens an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Auth`] when the mailbox rejects the
    /// credentials and [`TransportError::Connection`] /
    /// [`TransportError::Timeout`] for network failures.
    async fn open(&self) -> Result<Box<dyn MailboxSession>>;
}

/// An open session against one mailbox.
///
/// `close` must be invoked on every exit path, including after a failed
/// listing; the retrieval orchestrator owns that guarantee.
#[async_trait]
pub trait MailboxSession: Send {
    /// Lists raw messages received after `since`, newest preferred,
    /// bounded by the transport's configured result limit.
    async fn list_recent(&mut self, since: DateTime<Utc>) -> Result<Vec<RawMessage>>;

    /// Releases the underlying connection or client. Idempotent.
    async fn close(&mut self);
}

/// Builds per-request transports for resolved backends.
///
/// Sessions are request-scoped, so a fresh transport is constructed for
/// every retrieval; nothing is pooled across requests.
pub trait TransportFactory: Send + Sync {
    /// Transport for the OAuth webmail backend, authorized by a valid
    /// access token obtained from the credential lifecycle manager.
    fn oauth_mailbox(&self, access_token: &str) -> Box<dyn MailboxTransport>;

    /// Transport for an IMAP backend using the account's stored
    /// connection parameters and credentials.
    fn imap_mailbox(&self, address: &str, params: &ImapParams) -> Box<dyn MailboxTransport>;
}
