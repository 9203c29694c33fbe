//! Retrieval orchestration.
//!
//! [`RetrievalService`] is the crate's single outward operation. It
//! composes resolution, credential validation, transport access, and
//! matching into one request-scoped flow:
//!
//! normalize → resolve backend → (OAuth only) ensure credentials →
//! open session → list recent → match and rank → close → outcome.
//!
//! The transport session is closed on every exit path, including after
//! a failed listing. If the caller abandons the request mid-flight,
//! dropping the session releases the underlying socket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::matcher::{MatchCriteria, MessageMatcher};
use super::resolver::{BackendDescriptor, ProviderResolver, ResolveError};
use crate::auth::{CredentialError, CredentialLifecycleManager, OAuthProviderClient};
use crate::config::Settings;
use crate::domain::{OwnerId, SenderRuleSet};
use crate::providers::{TransportError, TransportFactory};
use crate::stores::{AccountStore, CredentialStore, StoreError};

/// The message selected by a successful retrieval.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    /// Displayable HTML content.
    pub html: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

/// Outcome of a retrieval that completed without error.
///
/// `NotFound` carries what was searched so the boundary layer can phrase
/// a human-readable message; no markup is composed here.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The most recent matching message.
    Found(RenderedMessage),
    /// The mailbox was reachable but nothing matched.
    NotFound {
        /// The alias that was searched.
        alias: String,
        /// The platform whose senders were matched against.
        platform: String,
        /// The recency window that applied.
        window: Duration,
    },
}

/// Errors from the retrieval flow.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The alias has no domain part; rejected before any I/O.
    #[error("alias has no domain part: {0}")]
    BadAlias(String),

    /// No backend resolves for this owner and alias.
    #[error("no provider configured for this alias")]
    NoProvider,

    /// Credential validation failed (OAuth path).
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The mailbox could not be read; transient, nothing deactivated.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The durable store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ResolveError> for RetrievalError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::BadAlias(alias) => RetrievalError::BadAlias(alias),
            ResolveError::NoProvider => RetrievalError::NoProvider,
            ResolveError::Store(e) => RetrievalError::Store(e),
        }
    }
}

/// Top-level retrieval entry point.
pub struct RetrievalService<A, C, P, F> {
    resolver: ProviderResolver<A, C>,
    lifecycle: CredentialLifecycleManager<C, P>,
    transports: F,
    matcher: MessageMatcher,
    window: Duration,
}

impl<A, C, P, F> RetrievalService<A, C, P, F>
where
    A: AccountStore,
    C: CredentialStore,
    P: OAuthProviderClient,
    F: TransportFactory,
{
    /// Wires the retrieval flow over its collaborators.
    pub fn new(
        accounts: Arc<A>,
        credentials: Arc<C>,
        provider: P,
        transports: F,
        rules: SenderRuleSet,
        settings: &Settings,
    ) -> Self {
        Self {
            resolver: ProviderResolver::new(
                accounts,
                credentials.clone(),
                settings.oauth.address_domain.clone(),
            ),
            lifecycle: CredentialLifecycleManager::new(credentials, provider),
            transports,
            matcher: MessageMatcher::new(rules),
            window: settings.retrieval.window,
        }
    }

    /// Fetches the most recent message for `alias` sent by a known
    /// sender of `platform` within the recency window.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::BadAlias`] for an alias without a domain part
    /// - [`RetrievalError::NoProvider`] when no backend resolves
    /// - [`RetrievalError::Credential`] when the OAuth credential is
    ///   missing or revoked
    /// - [`RetrievalError::Transport`] for mailbox failures; safe to
    ///   retry with backoff at the caller's discretion
    pub async fn fetch_latest(
        &self,
        owner_id: OwnerId,
        alias: &str,
        platform: &str,
    ) -> Result<FetchOutcome, RetrievalError> {
        let alias = alias.trim().to_lowercase();
        let platform = platform.trim().to_lowercase();

        let backend = self.resolver.resolve(owner_id, &alias, &platform).await?;

        let cutoff = Utc::now() - chrono::Duration::seconds(self.window.as_secs() as i64);
        let criteria = MatchCriteria {
            platform: platform.clone(),
            // A dedicated mailbox is the alias; only shared mailboxes
            // need the recipient check.
            recipient_alias: match &backend {
                BackendDescriptor::Imap { .. } => None,
                BackendDescriptor::Oauth { .. } | BackendDescriptor::CatchAll { .. } => {
                    Some(alias.clone())
                }
            },
            cutoff,
        };

        let transport = match &backend {
            BackendDescriptor::Oauth { address } => {
                let token = self.lifecycle.ensure_valid(owner_id, address).await?;
                self.transports.oauth_mailbox(&token.access_token)
            }
            BackendDescriptor::Imap { account } | BackendDescriptor::CatchAll { account } => {
                let params = account.imap.as_ref().ok_or_else(|| {
                    StoreError::Backend(format!(
                        "IMAP account {} has no connection parameters",
                        account.id
                    ))
                })?;
                self.transports.imap_mailbox(&account.address, params)
            }
        };

        let mut session = transport.open().await?;
        let listed = session.list_recent(cutoff).await;
        session.close().await;
        let raws = listed?;

        tracing::debug!(
            owner_id = %owner_id,
            %alias,
            %platform,
            messages = raws.len(),
            "listed recent messages"
        );

        let best = MessageMatcher::select_best(
            raws.iter()
                .filter_map(|raw| self.matcher.matches(raw, &criteria)),
        );

        match best {
            Some(candidate) => Ok(FetchOutcome::Found(RenderedMessage {
                html: candidate.html,
                received_at: candidate.received_at,
            })),
            None => Ok(FetchOutcome::NotFound {
                alias,
                platform,
                window: self.window,
            }),
        }
    }
}
