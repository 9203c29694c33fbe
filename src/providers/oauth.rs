//! OAuth webmail transport implementation.
//!
//! Talks to the provider's REST mailbox API with a bearer access token.
//! Listing is a two-step affair: a bounded id search with a relative
//! recency query, then a lazy per-message fetch of the raw RFC 5322
//! body. The token itself is obtained upstream by the credential
//! lifecycle manager; this transport never reads stored credentials.

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;

use super::{MailboxSession, MailboxTransport, RawMessage, Result, TransportError};

/// Message list response from the mailbox API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    messages: Option<Vec<MessageRef>>,
}

/// Reference to one message in a list response.
#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Raw-format message response.
#[derive(Debug, Deserialize)]
struct RawMessageResponse {
    raw: Option<String>,
}

/// Transport for the OAuth webmail backend.
pub struct OAuthTransport {
    client: reqwest::Client,
    api_base: String,
    access_token: String,
    max_messages: usize,
    request_timeout: std::time::Duration,
}

impl OAuthTransport {
    /// Creates a transport bound to one access token.
    ///
    /// Every API request is bounded by `request_timeout` so a dead
    /// mailbox API cannot hang a retrieval.
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        access_token: impl Into<String>,
        max_messages: usize,
        request_timeout: std::time::Duration,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            access_token: access_token.into(),
            max_messages,
            request_timeout,
        }
    }
}

#[async_trait]
impl MailboxTransport for OAuthTransport {
    async fn open(&self) -> Result<Box<dyn MailboxSession>> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|e| TransportError::Protocol(format!("invalid token header: {}", e)))?,
        );

        Ok(Box::new(OAuthMailboxSession {
            client: self.client.clone(),
            api_base: self.api_base.clone(),
            headers,
            max_messages: self.max_messages,
            request_timeout: self.request_timeout,
        }))
    }
}

/// An authorized client against the mailbox API.
///
/// HTTP is connectionless, so `close` has nothing to release; it exists
/// to satisfy the session contract.
struct OAuthMailboxSession {
    client: reqwest::Client,
    api_base: String,
    headers: HeaderMap,
    max_messages: usize,
    request_timeout: std::time::Duration,
}

impl OAuthMailboxSession {
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.api_base, endpoint);

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => TransportError::Auth(format!("mailbox API refused token: {}", body)),
                _ => TransportError::Protocol(format!("mailbox API error ({}): {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("parse response: {}", e)))
    }
}

#[async_trait]
impl MailboxSession for OAuthMailboxSession {
    async fn list_recent(&mut self, since: DateTime<Utc>) -> Result<Vec<RawMessage>> {
        // The API takes a relative recency query, so the cutoff is
        // expressed as whole hours, rounded up to never under-fetch.
        // The matcher re-applies the exact cutoff afterwards.
        let elapsed = Utc::now().signed_duration_since(since);
        let hours = (elapsed.num_minutes().max(0) + 59) / 60;
        let hours = hours.max(1);

        let endpoint = format!(
            "/messages?maxResults={}&q=newer_than:{}h",
            self.max_messages, hours
        );
        let list: MessageListResponse = self.get(&endpoint).await?;

        let refs = list.messages.unwrap_or_default();
        let mut raws = Vec::with_capacity(refs.len());

        for msg in refs.into_iter().take(self.max_messages) {
            let endpoint = format!("/messages/{}?format=raw", msg.id);
            let response: RawMessageResponse = self.get(&endpoint).await?;

            let Some(raw) = response.raw else {
                continue;
            };
            match BASE64_URL_SAFE_NO_PAD.decode(raw.as_bytes()) {
                Ok(bytes) => raws.push(RawMessage::new(bytes)),
                Err(e) => {
                    tracing::debug!(message_id = %msg.id, error = %e, "skipping undecodable raw body");
                }
            }
        }

        Ok(raws)
    }

    async fn close(&mut self) {}
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(format!("mailbox API request: {}", e))
    } else if e.is_connect() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::Protocol(e.to_string())
    }
}
