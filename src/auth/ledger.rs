use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocket_db_pools::sqlx::{self, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::auth::jwt::TokenType;
use crate::store::{StoreError, StoreResult};

/// One outstanding revocable token. At most one exists per (user, type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Server-side record of refresh, reset-password and verify-email tokens.
/// Deleting a record revokes its token regardless of the embedded expiry.
#[rocket::async_trait]
pub trait TokenLedger: Send + Sync {
    /// Replace whatever record exists for (user, type) with this token.
    async fn issue(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<TokenRecord>;

    /// Idempotent; returns how many records were removed.
    async fn revoke(&self, user_id: Uuid, token_type: TokenType) -> StoreResult<u64>;

    async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64>;

    async fn lookup(&self, token: &str) -> StoreResult<Option<TokenRecord>>;
}

fn ensure_persisted(token_type: TokenType) -> StoreResult<()> {
    if token_type.is_persisted() {
        Ok(())
    } else {
        Err(StoreError::UnpersistedTokenType(token_type))
    }
}

#[derive(Debug, Clone)]
pub struct PgTokenLedger {
    pool: PgPool,
}

impl PgTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn record_from_row(row: &PgRow) -> StoreResult<TokenRecord> {
    let raw_type: String = row.try_get("token_type")?;
    let token_type = raw_type.parse::<TokenType>().map_err(|()| {
        StoreError::Database(sqlx::Error::Decode(
            format!("unknown token type '{raw_type}'").into(),
        ))
    })?;

    Ok(TokenRecord {
        id: row.try_get("id")?,
        token: row.try_get("token")?,
        user_id: row.try_get("user_id")?,
        token_type,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[rocket::async_trait]
impl TokenLedger for PgTokenLedger {
    async fn issue(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<TokenRecord> {
        ensure_persisted(token_type)?;

        // The (user_id, token_type) unique key makes this a single atomic
        // replace; concurrent issues for the same pair leave the last writer.
        let row = sqlx::query(
            r#"
            INSERT INTO tokens (id, token, user_id, token_type, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (user_id, token_type) DO UPDATE SET
                id = EXCLUDED.id,
                token = EXCLUDED.token,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            RETURNING id, token, user_id, token_type, expires_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token)
        .bind(user_id)
        .bind(token_type.as_str())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        record_from_row(&row)
    }

    async fn revoke(&self, user_id: Uuid, token_type: TokenType) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1 AND token_type = $2")
            .bind(user_id)
            .bind(token_type.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn lookup(&self, token: &str) -> StoreResult<Option<TokenRecord>> {
        let row = sqlx::query(
            "SELECT id, token, user_id, token_type, expires_at, created_at, updated_at FROM tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenLedger {
    records: Mutex<HashMap<(Uuid, TokenType), TokenRecord>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn record_for(&self, user_id: Uuid, token_type: TokenType) -> Option<TokenRecord> {
        self.records.lock().get(&(user_id, token_type)).cloned()
    }
}

#[rocket::async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn issue(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<TokenRecord> {
        ensure_persisted(token_type)?;

        let now = Utc::now();
        let record = TokenRecord {
            id: Uuid::new_v4(),
            token: token.to_string(),
            user_id,
            token_type,
            expires_at,
            created_at: now,
            updated_at: now,
        };
        self.records
            .lock()
            .insert((user_id, token_type), record.clone());
        Ok(record)
    }

    async fn revoke(&self, user_id: Uuid, token_type: TokenType) -> StoreResult<u64> {
        Ok(self
            .records
            .lock()
            .remove(&(user_id, token_type))
            .map_or(0, |_| 1))
    }

    async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|(owner, _), _| *owner != user_id);
        Ok((before - records.len()) as u64)
    }

    async fn lookup(&self, token: &str) -> StoreResult<Option<TokenRecord>> {
        Ok(self
            .records
            .lock()
            .values()
            .find(|record| record.token == token)
            .cloned())
    }
}
