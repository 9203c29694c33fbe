//! OAuth credential row operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{OAuthCredential, OwnerId, TokenRecord};
use crate::storage::database::{Database, Result};

/// The stored credential for (owner, address), active or not.
pub async fn get(
    db: &Database,
    owner_id: OwnerId,
    address: &str,
) -> Result<Option<OAuthCredential>> {
    let address = address.to_string();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT owner_id, address, token, active, updated_at
            FROM oauth_credentials
            WHERE owner_id = ?1 AND address = ?2
            "#,
        )?;

        let result = stmt
            .query_row(params![owner_id.0, address], row_to_credential)
            .optional()?;
        Ok(result)
    })
    .await
}

/// Stores the token record and marks the credential active.
///
/// Last write wins on the (owner, address) key; concurrent refreshes
/// are not serialized here.
pub async fn upsert(
    db: &Database,
    owner_id: OwnerId,
    address: &str,
    token: &TokenRecord,
) -> Result<()> {
    let address = address.to_string();
    let token_json = serde_json::to_string(token).unwrap_or_default();

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO oauth_credentials (owner_id, address, token, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            ON CONFLICT (owner_id, address)
            DO UPDATE SET token = excluded.token, active = 1, updated_at = excluded.updated_at
            "#,
            params![owner_id.0, address, token_json, now],
        )?;

        Ok(())
    })
    .await
}

/// Marks the credential inactive, keeping the row.
pub async fn deactivate(db: &Database, owner_id: OwnerId, address: &str) -> Result<()> {
    let address = address.to_string();

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            UPDATE oauth_credentials
            SET active = 0, updated_at = ?1
            WHERE owner_id = ?2 AND address = ?3
            "#,
            params![now, owner_id.0, address],
        )?;

        Ok(())
    })
    .await
}

fn row_to_credential(row: &Row<'_>) -> std::result::Result<OAuthCredential, rusqlite::Error> {
    let token_json: String = row.get(2)?;
    let updated_at_str: String = row.get(4)?;

    let token: TokenRecord = serde_json::from_str(&token_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(OAuthCredential {
        owner_id: OwnerId(row.get(0)?),
        address: row.get(1)?,
        token,
        active: row.get::<_, i32>(3)? != 0,
        updated_at,
    })
}
