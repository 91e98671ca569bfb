//! Postgres Store
//!
//! sqlx-backed implementation of the store collaborators over the
//! marketplace schema:
//!
//! - `messages (id bigserial, sender_id uuid, receiver_id uuid,
//!   product_id uuid, content text, body text, created_at timestamptz)`
//! - `profiles (id uuid, first_name text, last_name text)`
//! - `products (id uuid, title text)`
//!
//! The legacy `body` column predates the rename to `content`; both are
//! selected and the engine normalizes at the boundary. Inserts made
//! through this store are fanned out to subscribers in this process.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::shared::config::AppConfig;
use crate::shared::error::StoreError;
use crate::shared::messaging::{ConversationKey, Message, MessageRecord, NewMessage};

use super::{broadcast_insert, Directory, InsertBroadcast, InsertSubscription, MessageStore};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::unavailable(err.to_string())
    }
}

/// Postgres-backed message store
#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
    inserts: InsertBroadcast,
}

impl PgMessageStore {
    /// Wrap an existing connection pool
    pub fn new(pool: PgPool, event_buffer: usize) -> Self {
        let (inserts, _) = broadcast::channel(event_buffer);
        Self { pool, inserts }
    }

    /// Connect using the configured database URL
    pub async fn connect(config: &AppConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::unavailable("no database URL configured"))?;
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool, config.event_buffer))
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> MessageRecord {
        MessageRecord {
            id: row.get("id"),
            sender_id: row.get("sender_id"),
            receiver_id: row.get("receiver_id"),
            product_id: row.get("product_id"),
            content: row.get("content"),
            body: row.get("body"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn messages_involving(&self, user_id: Uuid) -> Result<Vec<MessageRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender_id, receiver_id, product_id, content, body, created_at
            FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    async fn messages_for_key(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let (a, b) = key.participants();
        let rows = sqlx::query(
            r#"
            SELECT id, sender_id, receiver_id, product_id, content, body, created_at
            FROM messages
            WHERE product_id = $1
              AND ((sender_id = $2 AND receiver_id = $3)
                OR (sender_id = $3 AND receiver_id = $2))
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(key.product_id())
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    async fn insert_message(&self, draft: NewMessage) -> Result<Message, StoreError> {
        let content = draft.content.trim();
        if content.is_empty() {
            return Err(StoreError::rejected("message content is empty"));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, product_id, content, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING id, created_at
            "#,
        )
        .bind(draft.sender_id)
        .bind(draft.receiver_id)
        .bind(draft.product_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        let message = Message {
            id: row.get("id"),
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            product_id: draft.product_id,
            content: content.to_string(),
            created_at: row.get("created_at"),
        };

        tracing::debug!("[Store] stored message {} for product {}", message.id, message.product_id);
        broadcast_insert(&self.inserts, message.clone());
        Ok(message)
    }

    fn subscribe_inserts(&self) -> InsertSubscription {
        InsertSubscription::new(self.inserts.subscribe())
    }
}

/// Postgres-backed directory lookup
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT id, first_name, last_name
            FROM profiles
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                let first: Option<String> = row.get("first_name");
                let last: Option<String> = row.get("last_name");
                let name = [first, last]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                (id, name.trim().to_string())
            })
            .collect())
    }

    async fn product_titles(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT id, title
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<Uuid, _>("id"), row.get::<String, _>("title")))
            .collect())
    }
}
