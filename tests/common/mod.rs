//! Common test utilities and helpers
//!
//! Message fixtures, fault-injecting collaborators, and polling helpers
//! shared by the integration and property suites.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use marketchat::engine::MessagingSession;
use marketchat::shared::error::StoreError;
use marketchat::shared::messaging::{ConversationKey, Message, MessageRecord, NewMessage};
use marketchat::store::{Directory, InsertSubscription, MemoryStore, MessageStore};

/// Timestamp fixture: seconds since the epoch
pub fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

/// Message fixture
pub fn message(id: i64, sender: Uuid, receiver: Uuid, product: Uuid, t: i64) -> Message {
    Message {
        id,
        sender_id: sender,
        receiver_id: receiver,
        product_id: product,
        content: format!("message {}", id),
        created_at: ts(t),
    }
}

/// Storage record fixture
pub fn record(id: i64, sender: Uuid, receiver: Uuid, product: Uuid, t: i64) -> MessageRecord {
    MessageRecord::from(message(id, sender, receiver, product, t))
}

/// Let spawned fetch/send tasks finish and drain their results.
pub async fn settle<S, D>(session: &mut MessagingSession<S, D>)
where
    S: MessageStore + ?Sized + 'static,
    D: Directory + ?Sized + 'static,
{
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.poll();
    }
}

/// A message store with injectable faults, wrapping [`MemoryStore`]
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_bulk: AtomicBool,
    pub fail_thread: AtomicBool,
    pub fail_insert: AtomicBool,
    /// Delay applied to thread fetches, for staleness scenarios
    pub thread_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_thread(&self, fail: bool) {
        self.fail_thread.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn set_thread_delay_ms(&self, delay: u64) {
        self.thread_delay_ms.store(delay, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn messages_involving(&self, user_id: Uuid) -> Result<Vec<MessageRecord>, StoreError> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected bulk fetch failure"));
        }
        self.inner.messages_involving(user_id).await
    }

    async fn messages_for_key(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let delay = self.thread_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_thread.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected thread fetch failure"));
        }
        self.inner.messages_for_key(key).await
    }

    async fn insert_message(&self, draft: NewMessage) -> Result<Message, StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::rejected("injected insert failure"));
        }
        self.inner.insert_message(draft).await
    }

    fn subscribe_inserts(&self) -> InsertSubscription {
        self.inner.subscribe_inserts()
    }
}

/// A directory whose lookups always fail
pub struct FailingDirectory;

#[async_trait]
impl Directory for FailingDirectory {
    async fn user_names(&self, _ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        Err(StoreError::unavailable("directory offline"))
    }

    async fn product_titles(&self, _ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        Err(StoreError::unavailable("directory offline"))
    }
}
