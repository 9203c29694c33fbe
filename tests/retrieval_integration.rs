//! End-to-end retrieval scenarios over the real SQLite stores.
//!
//! Transports are scripted (no network); everything else is the real
//! wiring: rusqlite-backed stores, credential lifecycle, resolution,
//! matching, and the orchestrator.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;

use aliasbox::auth::{OAuthApiError, OAuthProviderClient};
use aliasbox::config::Settings;
use aliasbox::domain::{OwnerId, SenderRuleSet, TokenRecord};
use aliasbox::providers::{
    MailboxSession, MailboxTransport, RawMessage, TransportError, TransportFactory,
};
use aliasbox::services::{
    AccountService, FetchOutcome, RegisterImapAccount, RetrievalError, RetrievalService,
};
use aliasbox::storage::StorageLayer;
use aliasbox::stores::CredentialStore;

const OWNER: OwnerId = OwnerId(1);

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Scripted transports
// ============================================================================

struct ScriptedSession {
    messages: Vec<RawMessage>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl MailboxSession for ScriptedSession {
    async fn list_recent(&mut self, _since: DateTime<Utc>) -> Result<Vec<RawMessage>, TransportError> {
        Ok(self.messages.clone())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedMailbox {
    messages: Vec<RawMessage>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl MailboxTransport for ScriptedMailbox {
    async fn open(&self) -> Result<Box<dyn MailboxSession>, TransportError> {
        Ok(Box::new(ScriptedSession {
            messages: self.messages.clone(),
            closed: self.closed.clone(),
        }))
    }
}

#[derive(Default)]
struct ScriptedFactory {
    messages: Mutex<Vec<RawMessage>>,
    closed: Arc<AtomicBool>,
    opened: Arc<AtomicU32>,
}

impl ScriptedFactory {
    fn with_messages(messages: Vec<RawMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    fn mailbox(&self) -> Box<dyn MailboxTransport> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedMailbox {
            messages: self.messages.lock().unwrap().clone(),
            closed: self.closed.clone(),
        })
    }
}

impl TransportFactory for ScriptedFactory {
    fn oauth_mailbox(&self, _access_token: &str) -> Box<dyn MailboxTransport> {
        self.mailbox()
    }

    fn imap_mailbox(
        &self,
        _address: &str,
        _params: &aliasbox::domain::ImapParams,
    ) -> Box<dyn MailboxTransport> {
        self.mailbox()
    }
}

// ============================================================================
// Scripted OAuth provider
// ============================================================================

enum RefreshScript {
    Fresh,
    InvalidGrant,
}

struct ScriptedOAuth {
    refresh: RefreshScript,
}

#[async_trait]
impl OAuthProviderClient for ScriptedOAuth {
    async fn exchange_code(&self, _code: &str) -> Result<TokenRecord, OAuthApiError> {
        Ok(token("exchanged", Some("granted-refresh"), 3600))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenRecord, OAuthApiError> {
        match self.refresh {
            RefreshScript::Fresh => Ok(token("refreshed", None, 3600)),
            RefreshScript::InvalidGrant => {
                Err(OAuthApiError::InvalidGrant("Token has been revoked".into()))
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn token(access: &str, refresh: Option<&str>, expires_in_secs: i64) -> TokenRecord {
    TokenRecord {
        access_token: access.to_string(),
        expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        refresh_token: refresh.map(|s| s.to_string()),
        scope: None,
        token_type: Some("Bearer".to_string()),
    }
}

fn raw_message(from: &str, to: &str, age: Duration, body: &str) -> RawMessage {
    let date = (Utc::now() - age).to_rfc2822();
    RawMessage::new(
        format!(
            "From: {from}\r\nTo: {to}\r\nDate: {date}\r\nSubject: Your sign-in code\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{body}",
        )
        .into_bytes(),
    )
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.oauth.address_domain = "providera.example".to_string();
    settings
}

fn rules() -> SenderRuleSet {
    SenderRuleSet::new([("videoservice", vec!["videoservice.example"])])
}

async fn storage() -> Arc<StorageLayer> {
    init_tracing();
    Arc::new(StorageLayer::in_memory().await.unwrap())
}

fn retrieval(
    storage: Arc<StorageLayer>,
    refresh: RefreshScript,
    factory: ScriptedFactory,
) -> RetrievalService<StorageLayer, StorageLayer, ScriptedOAuth, ScriptedFactory> {
    RetrievalService::new(
        storage.clone(),
        storage,
        ScriptedOAuth { refresh },
        factory,
        rules(),
        &settings(),
    )
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn recent_platform_message_is_returned_for_oauth_alias() -> Result<()> {
    let storage = storage().await;
    storage
        .upsert(OWNER, "alice@providera.example", &token("live", Some("r1"), 3600))
        .await?;

    let factory = ScriptedFactory::with_messages(vec![raw_message(
        "billing@videoservice.example",
        "alice@providerA.example",
        Duration::hours(2),
        "<p>your code is 4821</p>",
    )]);
    let closed = factory.closed.clone();

    let service = retrieval(storage, RefreshScript::Fresh, factory);
    let outcome = service
        .fetch_latest(OWNER, "alice@providerA.example", "videoservice")
        .await?;

    let FetchOutcome::Found(message) = outcome else {
        panic!("expected a match");
    };
    assert!(message.html.contains("4821"));
    assert!(closed.load(Ordering::SeqCst));

    Ok(())
}

#[tokio::test]
async fn stale_message_yields_not_found_with_context() -> Result<()> {
    let storage = storage().await;
    storage
        .upsert(OWNER, "alice@providera.example", &token("live", Some("r1"), 3600))
        .await?;

    let factory = ScriptedFactory::with_messages(vec![raw_message(
        "billing@videoservice.example",
        "alice@providerA.example",
        Duration::hours(20),
        "<p>too old</p>",
    )]);

    let service = retrieval(storage, RefreshScript::Fresh, factory);
    let outcome = service
        .fetch_latest(OWNER, "alice@providerA.example", "videoservice")
        .await?;

    let FetchOutcome::NotFound { alias, platform, window } = outcome else {
        panic!("expected not-found");
    };
    assert_eq!(alias, "alice@providera.example");
    assert_eq!(platform, "videoservice");
    assert_eq!(window.as_secs(), 12 * 60 * 60);

    Ok(())
}

#[tokio::test]
async fn unknown_alias_fails_without_contacting_any_transport() -> Result<()> {
    let storage = storage().await;
    let factory = ScriptedFactory::default();
    let opened = factory.opened.clone();
    let service = retrieval(storage, RefreshScript::Fresh, factory);

    let result = service
        .fetch_latest(OWNER, "bob@unknown.example", "videoservice")
        .await;

    assert!(matches!(result, Err(RetrievalError::NoProvider)));
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn revoked_grant_deactivates_then_resolution_stops_matching() -> Result<()> {
    let storage = storage().await;
    // Expired access token forces a refresh on first use.
    storage
        .upsert(OWNER, "alice@providera.example", &token("stale", Some("r1"), -60))
        .await?;

    let factory = ScriptedFactory::default();
    let opened = factory.opened.clone();
    let service = retrieval(storage.clone(), RefreshScript::InvalidGrant, factory);

    // First call: the refresh is rejected, the credential is deactivated.
    let result = service
        .fetch_latest(OWNER, "alice@providera.example", "videoservice")
        .await;
    assert!(matches!(result, Err(RetrievalError::Credential(_))));

    let stored = storage.get(OWNER, "alice@providera.example").await?.unwrap();
    assert!(!stored.active);

    // Second call: rule 1 no longer matches, so there is no provider at
    // all, not a credential error. No mailbox was ever opened.
    let result = service
        .fetch_latest(OWNER, "alice@providera.example", "videoservice")
        .await;
    assert!(matches!(result, Err(RetrievalError::NoProvider)));
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn malformed_alias_is_rejected_before_io() -> Result<()> {
    let storage = storage().await;
    let factory = ScriptedFactory::default();
    let opened = factory.opened.clone();
    let service = retrieval(storage, RefreshScript::Fresh, factory);

    let result = service.fetch_latest(OWNER, "no-domain", "videoservice").await;
    assert!(matches!(result, Err(RetrievalError::BadAlias(_))));
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn catch_all_account_serves_aliases_of_its_domain() -> Result<()> {
    let storage = storage().await;

    let accounts = AccountService::new(
        storage.clone(),
        storage.clone(),
        ScriptedOAuth {
            refresh: RefreshScript::Fresh,
        },
        settings().oauth,
    );
    accounts
        .register_imap_account(
            OWNER,
            RegisterImapAccount::new("inbox@jotavix.example", "secret", "imap.jotavix.example")
                .catch_all(true),
        )
        .await?;

    let factory = ScriptedFactory::with_messages(vec![
        raw_message(
            "info@mailer.videoservice.example",
            "cliente7@jotavix.example",
            Duration::hours(1),
            "<p>for the catch-all alias</p>",
        ),
        raw_message(
            "info@mailer.videoservice.example",
            "otro@jotavix.example",
            Duration::minutes(30),
            "<p>for a different alias</p>",
        ),
    ]);

    let service = retrieval(storage, RefreshScript::Fresh, factory);
    let outcome = service
        .fetch_latest(OWNER, "cliente7@jotavix.example", "videoservice")
        .await?;

    // Only the message addressed to the requested alias counts, even
    // though the other one is newer.
    let FetchOutcome::Found(message) = outcome else {
        panic!("expected a match");
    };
    assert!(message.html.contains("for the catch-all alias"));

    Ok(())
}

#[tokio::test]
async fn newest_of_two_messages_wins() -> Result<()> {
    let storage = storage().await;
    storage
        .upsert(OWNER, "alice@providera.example", &token("live", Some("r1"), 3600))
        .await?;

    let factory = ScriptedFactory::with_messages(vec![
        raw_message(
            "billing@videoservice.example",
            "alice@providera.example",
            Duration::hours(5),
            "<p>older code 1111</p>",
        ),
        raw_message(
            "billing@videoservice.example",
            "alice@providera.example",
            Duration::hours(1),
            "<p>newer code 2222</p>",
        ),
    ]);

    let service = retrieval(storage, RefreshScript::Fresh, factory);
    let outcome = service
        .fetch_latest(OWNER, "alice@providera.example", "videoservice")
        .await?;

    let FetchOutcome::Found(message) = outcome else {
        panic!("expected a match");
    };
    assert!(message.html.contains("2222"));

    Ok(())
}

#[tokio::test]
async fn expired_token_is_refreshed_and_merge_keeps_refresh_token() -> Result<()> {
    let storage = storage().await;
    storage
        .upsert(
            OWNER,
            "alice@providera.example",
            &token("stale", Some("long-lived"), -60),
        )
        .await?;

    let factory = ScriptedFactory::with_messages(vec![raw_message(
        "billing@videoservice.example",
        "alice@providera.example",
        Duration::hours(1),
        "<p>code 9</p>",
    )]);

    let service = retrieval(storage.clone(), RefreshScript::Fresh, factory);
    let outcome = service
        .fetch_latest(OWNER, "alice@providera.example", "videoservice")
        .await?;
    assert!(matches!(outcome, FetchOutcome::Found(_)));

    // The refresh response carried no refresh token; the stored one
    // must survive the rotation.
    let stored = storage.get(OWNER, "alice@providera.example").await?.unwrap();
    assert_eq!(stored.token.access_token, "refreshed");
    assert_eq!(stored.token.refresh_token, Some("long-lived".to_string()));

    Ok(())
}

#[tokio::test]
async fn dedicated_account_is_preferred_over_catch_all() -> Result<()> {
    let storage = storage().await;

    let accounts = AccountService::new(
        storage.clone(),
        storage.clone(),
        ScriptedOAuth {
            refresh: RefreshScript::Fresh,
        },
        settings().oauth,
    );
    accounts
        .register_imap_account(
            OWNER,
            RegisterImapAccount::new("inbox@jotavix.example", "secret", "imap.jotavix.example")
                .catch_all(true),
        )
        .await?;
    accounts
        .register_imap_account(
            OWNER,
            RegisterImapAccount::new("lalo@jotavix.example", "secret2", "imap.jotavix.example"),
        )
        .await?;

    // The dedicated mailbox applies no recipient filter, so a message
    // to a secondary form of the address still matches.
    let factory = ScriptedFactory::with_messages(vec![raw_message(
        "billing@videoservice.example",
        "lalo+promo@jotavix.example",
        Duration::hours(1),
        "<p>dedicated mailbox message</p>",
    )]);

    let service = retrieval(storage, RefreshScript::Fresh, factory);
    let outcome = service
        .fetch_latest(OWNER, "lalo@jotavix.example", "videoservice")
        .await?;

    let FetchOutcome::Found(message) = outcome else {
        panic!("expected a match");
    };
    assert!(message.html.contains("dedicated mailbox message"));

    Ok(())
}
