//! Database schema migrations.
//!
//! Each migration is idempotent (`IF NOT EXISTS`) and they run in order
//! on every open.

/// Mail account rows: one per (owner, address, transport).
const CREATE_MAIL_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS mail_accounts (
    id          TEXT PRIMARY KEY,
    owner_id    INTEGER NOT NULL,
    address     TEXT NOT NULL,
    transport   TEXT NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1,
    catch_all   INTEGER NOT NULL DEFAULT 0,
    imap_params TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (owner_id, address, transport)
);

CREATE INDEX IF NOT EXISTS idx_mail_accounts_owner
    ON mail_accounts (owner_id);

CREATE INDEX IF NOT EXISTS idx_mail_accounts_catch_all
    ON mail_accounts (owner_id, catch_all, active);
"#;

/// OAuth credential rows, keyed by (owner, address). Deactivation keeps
/// the row; re-authorization reuses it.
const CREATE_OAUTH_CREDENTIALS: &str = r#"
CREATE TABLE IF NOT EXISTS oauth_credentials (
    owner_id   INTEGER NOT NULL,
    address    TEXT NOT NULL,
    token      TEXT NOT NULL,
    active     INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (owner_id, address)
);
"#;

/// All migrations in execution order.
pub fn all_migrations() -> &'static [&'static str] {
    &[CREATE_MAIL_ACCOUNTS, CREATE_OAUTH_CREDENTIALS]
}
