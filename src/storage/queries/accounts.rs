//! Mail account row operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{AccountId, ImapParams, MailAccount, OwnerId, TransportKind};
use crate::storage::database::{Database, Result};

/// Inserts a new account row.
pub async fn insert(db: &Database, account: &MailAccount) -> Result<()> {
    let account = account.clone();

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        let imap_params = account
            .imap
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_default());

        conn.execute(
            r#"
            INSERT INTO mail_accounts (
                id, owner_id, address, transport, active, catch_all,
                imap_params, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                account.id.0,
                account.owner_id.0,
                account.address,
                account.transport.as_str(),
                account.active as i32,
                account.catch_all as i32,
                imap_params,
                account.created_at.to_rfc3339(),
                now,
            ],
        )?;

        Ok(())
    })
    .await
}

/// One account by owner, address, and transport kind.
pub async fn get(
    db: &Database,
    owner_id: OwnerId,
    address: &str,
    transport: TransportKind,
) -> Result<Option<MailAccount>> {
    let address = address.to_string();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, address, transport, active, catch_all, imap_params, created_at
            FROM mail_accounts
            WHERE owner_id = ?1 AND address = ?2 AND transport = ?3
            "#,
        )?;

        let result = stmt
            .query_row(
                params![owner_id.0, address, transport.as_str()],
                row_to_account,
            )
            .optional()?;
        Ok(result)
    })
    .await
}

/// One account by owner and id.
pub async fn get_by_id(
    db: &Database,
    owner_id: OwnerId,
    id: &AccountId,
) -> Result<Option<MailAccount>> {
    let id = id.clone();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, address, transport, active, catch_all, imap_params, created_at
            FROM mail_accounts
            WHERE owner_id = ?1 AND id = ?2
            "#,
        )?;

        let result = stmt
            .query_row(params![owner_id.0, id.0], row_to_account)
            .optional()?;
        Ok(result)
    })
    .await
}

/// All of an owner's accounts, newest first.
pub async fn by_owner(db: &Database, owner_id: OwnerId) -> Result<Vec<MailAccount>> {
    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, address, transport, active, catch_all, imap_params, created_at
            FROM mail_accounts
            WHERE owner_id = ?1
            ORDER BY created_at DESC
            "#,
        )?;

        let rows = stmt.query_map(params![owner_id.0], row_to_account)?;
        let accounts: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(accounts?)
    })
    .await
}

/// Active catch-all accounts for a domain, newest registration first.
pub async fn active_catch_all_by_domain(
    db: &Database,
    owner_id: OwnerId,
    domain: &str,
) -> Result<Vec<MailAccount>> {
    let suffix = format!("%@{}", domain);

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, address, transport, active, catch_all, imap_params, created_at
            FROM mail_accounts
            WHERE owner_id = ?1 AND active = 1 AND catch_all = 1 AND address LIKE ?2
            ORDER BY created_at DESC
            "#,
        )?;

        let rows = stmt.query_map(params![owner_id.0, suffix], row_to_account)?;
        let accounts: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(accounts?)
    })
    .await
}

/// Rewrites an account row's mutable fields.
pub async fn update(db: &Database, account: &MailAccount) -> Result<()> {
    let account = account.clone();

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        let imap_params = account
            .imap
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_default());

        conn.execute(
            r#"
            UPDATE mail_accounts
            SET address = ?1, active = ?2, catch_all = ?3, imap_params = ?4, updated_at = ?5
            WHERE owner_id = ?6 AND id = ?7
            "#,
            params![
                account.address,
                account.active as i32,
                account.catch_all as i32,
                imap_params,
                now,
                account.owner_id.0,
                account.id.0,
            ],
        )?;

        Ok(())
    })
    .await
}

/// Deletes an account row, owner-scoped.
pub async fn delete(db: &Database, owner_id: OwnerId, id: &AccountId) -> Result<()> {
    let id = id.clone();

    db.with_conn(move |conn| {
        conn.execute(
            "DELETE FROM mail_accounts WHERE owner_id = ?1 AND id = ?2",
            params![owner_id.0, id.0],
        )?;
        Ok(())
    })
    .await
}

fn row_to_account(row: &Row<'_>) -> std::result::Result<MailAccount, rusqlite::Error> {
    let transport_str: String = row.get(3)?;
    let imap_params_json: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    let transport = match transport_str.as_str() {
        "oauth" => TransportKind::Oauth,
        _ => TransportKind::Imap,
    };

    let imap: Option<ImapParams> = imap_params_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok());

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(MailAccount {
        id: AccountId(row.get(0)?),
        owner_id: OwnerId(row.get(1)?),
        address: row.get(2)?,
        transport,
        active: row.get::<_, i32>(4)? != 0,
        catch_all: row.get::<_, i32>(5)? != 0,
        imap,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_account(address: &str, catch_all: bool) -> MailAccount {
        MailAccount {
            id: AccountId::from(format!("account-{}", address)),
            owner_id: OwnerId(1),
            address: address.to_string(),
            transport: TransportKind::Imap,
            active: true,
            catch_all,
            imap: Some(ImapParams {
                host: "imap.example.com".to_string(),
                port: 993,
                use_tls: true,
                password: "secret".to_string(),
            }),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_account() {
        let db = Database::open_in_memory().await.unwrap();
        let account = make_account("inbox@dominio.example", false);

        insert(&db, &account).await.unwrap();

        let retrieved = get(&db, OwnerId(1), "inbox@dominio.example", TransportKind::Imap)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(retrieved.id, account.id);
        assert_eq!(retrieved.address, account.address);
        assert!(retrieved.active);
        assert_eq!(retrieved.imap.unwrap().host, "imap.example.com");
    }

    #[tokio::test]
    async fn get_scopes_by_owner_and_transport() {
        let db = Database::open_in_memory().await.unwrap();
        insert(&db, &make_account("inbox@dominio.example", false))
            .await
            .unwrap();

        let other_owner = get(&db, OwnerId(2), "inbox@dominio.example", TransportKind::Imap)
            .await
            .unwrap();
        assert!(other_owner.is_none());

        let other_kind = get(&db, OwnerId(1), "inbox@dominio.example", TransportKind::Oauth)
            .await
            .unwrap();
        assert!(other_kind.is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_violates_constraint() {
        let db = Database::open_in_memory().await.unwrap();
        let account = make_account("inbox@dominio.example", false);

        insert(&db, &account).await.unwrap();

        let mut again = account.clone();
        again.id = AccountId::from("account-other-id");
        assert!(insert(&db, &again).await.is_err());
    }

    #[tokio::test]
    async fn catch_all_lookup_orders_newest_first() {
        let db = Database::open_in_memory().await.unwrap();

        let mut older = make_account("old@dominio.example", true);
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = make_account("new@dominio.example", true);

        insert(&db, &older).await.unwrap();
        insert(&db, &newer).await.unwrap();

        let found = active_catch_all_by_domain(&db, OwnerId(1), "dominio.example")
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].address, "new@dominio.example");
    }

    #[tokio::test]
    async fn catch_all_lookup_skips_inactive_and_other_domains() {
        let db = Database::open_in_memory().await.unwrap();

        let mut inactive = make_account("off@dominio.example", true);
        inactive.active = false;
        insert(&db, &inactive).await.unwrap();
        insert(&db, &make_account("inbox@otra.example", true))
            .await
            .unwrap();

        let found = active_catch_all_by_domain(&db, OwnerId(1), "dominio.example")
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn update_round_trips_flags() {
        let db = Database::open_in_memory().await.unwrap();
        let mut account = make_account("inbox@dominio.example", true);
        insert(&db, &account).await.unwrap();

        account.active = false;
        account.catch_all = false;
        update(&db, &account).await.unwrap();

        let retrieved = get_by_id(&db, OwnerId(1), &account.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!retrieved.active);
        assert!(!retrieved.catch_all);
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let db = Database::open_in_memory().await.unwrap();
        let account = make_account("inbox@dominio.example", false);
        insert(&db, &account).await.unwrap();

        delete(&db, OwnerId(2), &account.id).await.unwrap();
        assert!(get_by_id(&db, OwnerId(1), &account.id)
            .await
            .unwrap()
            .is_some());

        delete(&db, OwnerId(1), &account.id).await.unwrap();
        assert!(get_by_id(&db, OwnerId(1), &account.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn by_owner_lists_newest_first() {
        let db = Database::open_in_memory().await.unwrap();

        let mut older = make_account("a@dominio.example", false);
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        insert(&db, &older).await.unwrap();
        insert(&db, &make_account("b@dominio.example", false))
            .await
            .unwrap();

        let accounts = by_owner(&db, OwnerId(1)).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].address, "b@dominio.example");
    }
}
