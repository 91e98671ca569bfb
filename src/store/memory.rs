//! In-Memory Store
//!
//! A process-local implementation of the store collaborators, backed by a
//! `tokio::sync::broadcast` channel for the insert-event stream. Inserts
//! are stored first, then fanned out to subscribers, the same pipeline a
//! server-backed store runs on its side of the wire.
//!
//! Used by the test suite and the demo binary. The extra
//! [`MemoryStore::emit_insert`] hook re-broadcasts an event without
//! touching storage, which is how tests simulate the duplicate and
//! out-of-order delivery the at-least-once contract allows.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::config::DEFAULT_EVENT_BUFFER;
use crate::shared::error::StoreError;
use crate::shared::messaging::{ConversationKey, Message, MessageRecord, NewMessage};

use super::{broadcast_insert, Directory, InsertBroadcast, InsertSubscription, MessageStore};

#[derive(Debug, Default)]
struct MemoryRows {
    next_id: i64,
    records: Vec<MessageRecord>,
}

/// In-memory message store
#[derive(Debug)]
pub struct MemoryStore {
    rows: RwLock<MemoryRows>,
    inserts: InsertBroadcast,
}

impl MemoryStore {
    /// Create a store with the default event buffer capacity
    pub fn new() -> Self {
        Self::with_event_buffer(DEFAULT_EVENT_BUFFER)
    }

    /// Create a store with an explicit event buffer capacity
    pub fn with_event_buffer(capacity: usize) -> Self {
        let (inserts, _) = broadcast::channel(capacity);
        Self {
            rows: RwLock::new(MemoryRows {
                next_id: 1,
                records: Vec::new(),
            }),
            inserts,
        }
    }

    /// Seed a pre-existing record without emitting an insert event.
    ///
    /// Fixture helper: the record keeps its own `id` and `created_at`,
    /// and the id counter advances past it.
    pub async fn seed(&self, record: MessageRecord) {
        let mut rows = self.rows.write().await;
        rows.next_id = rows.next_id.max(record.id + 1);
        rows.records.push(record);
    }

    /// Re-broadcast an insert event without touching storage.
    ///
    /// Simulates the replay a reconnecting subscription may observe.
    pub fn emit_insert(&self, message: &Message) {
        broadcast_insert(&self.inserts, message.clone());
    }

    /// Number of stored records
    pub async fn message_count(&self) -> usize {
        self.rows.read().await.records.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record_matches_key(record: &MessageRecord, key: &ConversationKey) -> bool {
    record.product_id == key.product_id()
        && ConversationKey::new(record.sender_id, record.receiver_id, record.product_id) == *key
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn messages_involving(&self, user_id: Uuid) -> Result<Vec<MessageRecord>, StoreError> {
        let rows = self.rows.read().await;
        let mut records: Vec<MessageRecord> = rows
            .records
            .iter()
            .filter(|r| r.sender_id == user_id || r.receiver_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    async fn messages_for_key(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let rows = self.rows.read().await;
        let mut records: Vec<MessageRecord> = rows
            .records
            .iter()
            .filter(|r| record_matches_key(r, key))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    async fn insert_message(&self, draft: NewMessage) -> Result<Message, StoreError> {
        let content = draft.content.trim();
        if content.is_empty() {
            return Err(StoreError::rejected("message content is empty"));
        }

        let message = {
            let mut rows = self.rows.write().await;
            let message = Message {
                id: rows.next_id,
                sender_id: draft.sender_id,
                receiver_id: draft.receiver_id,
                product_id: draft.product_id,
                content: content.to_string(),
                created_at: Utc::now(),
            };
            rows.next_id += 1;
            rows.records.push(MessageRecord::from(message.clone()));
            message
        };

        tracing::debug!("[Store] stored message {} for product {}", message.id, message.product_id);
        broadcast_insert(&self.inserts, message.clone());
        Ok(message)
    }

    fn subscribe_inserts(&self) -> InsertSubscription {
        InsertSubscription::new(self.inserts.subscribe())
    }
}

/// In-memory directory of display names and product titles
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<Uuid, String>>,
    products: RwLock<HashMap<Uuid, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user's display name
    pub async fn insert_user(&self, id: Uuid, name: impl Into<String>) {
        self.users.write().await.insert(id, name.into());
    }

    /// Register a product title
    pub async fn insert_product(&self, id: Uuid, title: impl Into<String>) {
        self.products.write().await.insert(id, title.into());
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        let users = self.users.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| users.get(id).map(|name| (*id, name.clone())))
            .collect())
    }

    async fn product_titles(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).map(|title| (*id, title.clone())))
            .collect())
    }
}
