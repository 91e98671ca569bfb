//! Store Collaborators
//!
//! The engine does not own persistence: it consumes a [`MessageStore`]
//! (query, insert, insert-event subscription) and a [`Directory`]
//! (display-name and product-title lookups). Both are passed into the
//! session explicitly, never reached through globals.
//!
//! # Delivery Model
//!
//! `subscribe_inserts` is at-least-once and best-effort-ordered: after a
//! reconnect the stream may replay or skip events, and events may arrive
//! out of `created_at` order. The engine's idempotent merge is the only
//! defense, so implementations are free to be sloppy here and correct
//! everywhere else.
//!
//! # Implementations
//!
//! - [`MemoryStore`] / [`MemoryDirectory`] - in-process, broadcast-backed;
//!   used by tests and the demo binary
//! - `PgMessageStore` / `PgDirectory` - Postgres via sqlx, behind the
//!   `postgres` feature

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::shared::error::StoreError;
use crate::shared::messaging::{ConversationKey, Message, MessageRecord, NewMessage};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemoryDirectory, MemoryStore};
#[cfg(feature = "postgres")]
pub use postgres::{PgDirectory, PgMessageStore};

/// Insert-event broadcast channel
///
/// Cloned into every store handle that can produce inserts; subscribers
/// receive a copy of each event.
pub type InsertBroadcast = broadcast::Sender<Message>;

/// Broadcast an insert event to all subscribers
///
/// Returns the number of active subscribers that received the event
/// (0 if no subscribers, which is not an error).
pub fn broadcast_insert(inserts: &InsertBroadcast, message: Message) -> usize {
    match inserts.send(message) {
        Ok(subscriber_count) => {
            tracing::debug!("[Store] insert broadcast to {} subscribers", subscriber_count);
            subscriber_count
        }
        Err(_) => {
            tracing::debug!("[Store] no subscribers to receive insert");
            0
        }
    }
}

/// The persistence collaborator
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All messages the user participates in, ordered by `created_at`
    async fn messages_involving(&self, user_id: Uuid) -> Result<Vec<MessageRecord>, StoreError>;

    /// Both directions of one conversation, ordered by `created_at`
    async fn messages_for_key(&self, key: &ConversationKey)
        -> Result<Vec<MessageRecord>, StoreError>;

    /// Insert a draft; the store assigns `id` and `created_at`
    async fn insert_message(&self, draft: NewMessage) -> Result<Message, StoreError>;

    /// Subscribe to the insert-event stream
    fn subscribe_inserts(&self) -> InsertSubscription;
}

/// The display-name and product-title lookup collaborator
///
/// Unknown ids are omitted from the result mapping rather than erroring.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve display names for a batch of user ids
    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError>;

    /// Resolve titles for a batch of product ids
    async fn product_titles(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError>;
}

/// The insert-event subscription was closed by the store
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("insert subscription lost")]
pub struct SubscriptionLost;

/// A cancellable subscription to the insert-event stream
///
/// Lagged receivers log a warning and keep going (the merge rules absorb
/// the resulting replay or loss); a closed channel surfaces as
/// [`SubscriptionLost`] so the consumer can resubscribe.
#[derive(Debug)]
pub struct InsertSubscription {
    rx: broadcast::Receiver<Message>,
}

impl InsertSubscription {
    /// Wrap a broadcast receiver
    pub fn new(rx: broadcast::Receiver<Message>) -> Self {
        Self { rx }
    }

    /// Take the next buffered event without blocking.
    ///
    /// `Ok(None)` means the buffer is currently empty.
    pub fn try_next(&mut self) -> Result<Option<Message>, SubscriptionLost> {
        loop {
            match self.rx.try_recv() {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("[Store] insert subscription lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::TryRecvError::Closed) => return Err(SubscriptionLost),
            }
        }
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Result<Message, SubscriptionLost> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Ok(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Store] insert subscription lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionLost),
            }
        }
    }

    /// Consume the subscription as an asynchronous stream
    pub fn into_stream(self) -> BroadcastStream<Message> {
        BroadcastStream::new(self.rx)
    }

    /// Cancel the subscription
    pub fn cancel(self) {
        drop(self);
    }
}
