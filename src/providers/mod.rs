//! Mailbox transport implementations.
//!
//! This module contains the [`MailboxTransport`]/[`MailboxSession`] seam
//! and the two backends that implement it:
//!
//! - [`OAuthTransport`] - webmail REST API with a bearer access token
//! - [`ImapTransport`] - IMAP4rev1 over TLS with stored credentials
//!
//! # Architecture
//!
//! Transports are request-scoped: the retrieval orchestrator asks a
//! [`TransportFactory`] for a fresh transport per request, opens one
//! session, lists messages newer than the cutoff, and closes the session
//! on every exit path. Nothing here is pooled or shared across requests.

mod imap;
mod oauth;
mod traits;

pub use imap::ImapTransport;
pub use oauth::OAuthTransport;
pub use traits::{
    MailboxSession, MailboxTransport, RawMessage, Result, TransportError, TransportFactory,
};

use std::time::Duration;

use crate::config::Settings;
use crate::domain::ImapParams;

/// [`TransportFactory`] that builds real network transports from the
/// configured endpoints and limits.
#[derive(Clone)]
pub struct NetworkTransportFactory {
    http: reqwest::Client,
    api_base: String,
    max_messages: usize,
    auth_timeout: Duration,
    operation_timeout: Duration,
}

impl NetworkTransportFactory {
    /// Creates a factory from the loaded settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: settings.oauth.api_base.clone(),
            max_messages: settings.retrieval.max_messages,
            auth_timeout: settings.imap.auth_timeout,
            operation_timeout: settings.imap.operation_timeout,
        }
    }
}

impl TransportFactory for NetworkTransportFactory {
    fn oauth_mailbox(&self, access_token: &str) -> Box<dyn MailboxTransport> {
        Box::new(OAuthTransport::new(
            self.http.clone(),
            self.api_base.clone(),
            access_token,
            self.max_messages,
            self.operation_timeout,
        ))
    }

    fn imap_mailbox(&self, address: &str, params: &ImapParams) -> Box<dyn MailboxTransport> {
        Box::new(ImapTransport::new(
            address,
            params.clone(),
            self.auth_timeout,
            self.operation_timeout,
            self.max_messages,
        ))
    }
}
