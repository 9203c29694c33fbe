//! IMAP transport implementation.
//!
//! Opens an encrypted session using per-account connection parameters,
//! runs a date-bounded `SINCE` search against INBOX, and fetches message
//! bodies with `BODY.PEEK[]` so retrieval never flips read flags.
//!
//! # Protocol details
//!
//! - IMAP4rev1 (RFC 3501) via `async-imap`
//! - Implicit TLS through `tokio-rustls` when the account asks for it,
//!   plain TCP otherwise (some internal relays terminate TLS upstream)
//! - Connect/login and listing phases are independently bounded by the
//!   configured timeouts; a dead mailbox surfaces as
//!   [`TransportError::Timeout`]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::{AsyncRead, AsyncWrite};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::compat::TokioAsyncReadCompatExt;

use super::{MailboxSession, MailboxTransport, RawMessage, Result, TransportError};
use crate::domain::ImapParams;

/// Stream bounds required by `async-imap`, erased so TLS and plain TCP
/// sessions share one session type.
trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug> ImapStream for T {}

type BoxedImapSession = async_imap::Session<Box<dyn ImapStream>>;

/// Transport for a dedicated or catch-all IMAP mailbox.
pub struct ImapTransport {
    username: String,
    params: ImapParams,
    auth_timeout: Duration,
    operation_timeout: Duration,
    max_messages: usize,
}

impl ImapTransport {
    /// Creates a transport for one account's mailbox.
    ///
    /// `username` is the login name, normally the account address.
    pub fn new(
        username: impl Into<String>,
        params: ImapParams,
        auth_timeout: Duration,
        operation_timeout: Duration,
        max_messages: usize,
    ) -> Self {
        Self {
            username: username.into(),
            params,
            auth_timeout,
            operation_timeout,
            max_messages,
        }
    }

    async fn connect_and_login(&self) -> Result<BoxedImapSession> {
        let addr = format!("{}:{}", self.params.host, self.params.port);
        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| TransportError::Connection(format!("TCP connect failed: {}", e)))?;

        let stream: Box<dyn ImapStream> = if self.params.use_tls {
            let config = ClientConfig::builder()
                .with_root_certificates(RootCertStore::from_iter(
                    webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
                ))
                .with_no_client_auth();

            let connector = TlsConnector::from(Arc::new(config));
            let server_name = ServerName::try_from(self.params.host.clone())
                .map_err(|e| TransportError::Connection(format!("invalid server name: {}", e)))?;

            let tls_stream = connector
                .connect(server_name, tcp_stream)
                .await
                .map_err(|e| TransportError::Connection(format!("TLS handshake failed: {}", e)))?;

            Box::new(tls_stream.compat())
        } else {
            Box::new(tcp_stream.compat())
        };

        let client = async_imap::Client::new(stream);
        let session = client
            .login(&self.username, &self.params.password)
            .await
            .map_err(|e| TransportError::Auth(format!("IMAP login failed: {:?}", e.0)))?;

        Ok(session)
    }
}

#[async_trait]
impl MailboxTransport for ImapTransport {
    async fn open(&self) -> Result<Box<dyn MailboxSession>> {
        let session = tokio::time::timeout(self.auth_timeout, self.connect_and_login())
            .await
            .map_err(|_| {
                TransportError::Timeout(format!("IMAP login to {}", self.params.host))
            })??;

        tracing::debug!(host = %self.params.host, user = %self.username, "IMAP session established");

        Ok(Box::new(ImapMailboxSession {
            session: Some(session),
            operation_timeout: self.operation_timeout,
            max_messages: self.max_messages,
        }))
    }
}

/// An authenticated IMAP session; logs out on close.
struct ImapMailboxSession {
    session: Option<BoxedImapSession>,
    operation_timeout: Duration,
    max_messages: usize,
}

#[async_trait]
impl MailboxSession for ImapMailboxSession {
    async fn list_recent(&mut self, since: DateTime<Utc>) -> Result<Vec<RawMessage>> {
        let max_messages = self.max_messages;
        let operation_timeout = self.operation_timeout;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| TransportError::Connection("session already closed".to_string()))?;

        let listing = async move {
            session
                .select("INBOX")
                .await
                .map_err(|e| TransportError::Connection(format!("SELECT failed: {}", e)))?;

            // IMAP SINCE has day granularity; the matcher re-applies the
            // exact cutoff on parsed dates.
            let query = format!("SINCE {}", since.format("%d-%b-%Y"));
            let uids = session
                .uid_search(&query)
                .await
                .map_err(|e| TransportError::Connection(format!("SEARCH failed: {}", e)))?;

            let mut uid_list: Vec<u32> = uids.into_iter().collect();
            uid_list.sort_by(|a, b| b.cmp(a));
            uid_list.truncate(max_messages);

            if uid_list.is_empty() {
                return Ok(Vec::new());
            }

            let uid_seq = uid_list
                .iter()
                .map(|u| u.to_string())
                .collect::<Vec<_>>()
                .join(",");

            // BODY.PEEK[] keeps \Seen untouched.
            let mut fetches = session
                .uid_fetch(&uid_seq, "(UID BODY.PEEK[])")
                .await
                .map_err(|e| TransportError::Connection(format!("FETCH failed: {}", e)))?;

            let mut raws = Vec::new();
            while let Some(fetch_result) = fetches.next().await {
                match fetch_result {
                    Ok(fetch) => {
                        if let Some(body) = fetch.body() {
                            raws.push(RawMessage::new(body.to_vec()));
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping message that failed to fetch");
                    }
                }
            }

            Ok(raws)
        };

        tokio::time::timeout(operation_timeout, listing)
            .await
            .map_err(|_| TransportError::Timeout("IMAP listing".to_string()))?
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout().await {
                tracing::debug!(error = %e, "IMAP logout failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(use_tls: bool) -> ImapTransport {
        ImapTransport::new(
            "inbox@example.com",
            ImapParams {
                host: "imap.example.com".to_string(),
                port: 993,
                use_tls,
                password: "secret".to_string(),
            },
            Duration::from_secs(15),
            Duration::from_secs(30),
            25,
        )
    }

    #[test]
    fn transport_carries_account_parameters() {
        let t = transport(true);
        assert_eq!(t.params.host, "imap.example.com");
        assert_eq!(t.params.port, 993);
        assert!(t.params.use_tls);
    }

    #[tokio::test]
    async fn listing_on_closed_session_fails() {
        let mut session = ImapMailboxSession {
            session: None,
            operation_timeout: Duration::from_secs(1),
            max_messages: 25,
        };

        let result = session.list_recent(Utc::now()).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }

    #[tokio::test]
    async fn close_is_idempotent_without_session() {
        let mut session = ImapMailboxSession {
            session: None,
            operation_timeout: Duration::from_secs(1),
            max_messages: 25,
        };
        session.close().await;
        session.close().await;
    }

    #[test]
    fn since_query_uses_imap_date_format() {
        let since = DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format!("SINCE {}", since.format("%d-%b-%Y")), "SINCE 05-Mar-2024");
    }
}
