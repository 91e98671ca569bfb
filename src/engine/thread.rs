//! Thread Loader
//!
//! Fetches the full history of one conversation and establishes the
//! thread ordering invariant: ascending `(created_at, id)`, no duplicate
//! ids. The fetch covers both directions of the participant pair through
//! the same canonical-key predicate the aggregator groups by.

use std::collections::HashSet;

use crate::shared::error::ChatError;
use crate::shared::messaging::{ConversationKey, Message};
use crate::store::MessageStore;

/// The ordered message history of the open conversation
#[derive(Debug, Clone)]
pub struct OpenThread {
    /// Which conversation this history belongs to
    pub key: ConversationKey,
    /// Messages in ascending `(created_at, id)` order
    pub messages: Vec<Message>,
}

/// Load and order one conversation's history.
///
/// A conversation with no messages yet (for example one whose first send
/// has not flushed) is an empty vector, not an error. A failed fetch is
/// [`ChatError::StoreUnavailable`]; the caller keeps whatever thread it
/// already had.
pub async fn load_thread<S>(store: &S, key: &ConversationKey) -> Result<Vec<Message>, ChatError>
where
    S: MessageStore + ?Sized,
{
    let records = store
        .messages_for_key(key)
        .await
        .map_err(ChatError::StoreUnavailable)?;

    let mut messages: Vec<Message> = Vec::with_capacity(records.len());
    for record in records {
        let id = record.id;
        let Some(message) = record.normalize() else {
            tracing::warn!("[Thread] skipping message {} with no usable content", id);
            continue;
        };
        if !key.matches(&message) {
            tracing::warn!("[Thread] store returned message {} outside the conversation", id);
            continue;
        }
        messages.push(message);
    }

    messages.sort_by_key(Message::sort_key);
    let mut seen: HashSet<i64> = HashSet::with_capacity(messages.len());
    messages.retain(|m| seen.insert(m.id));

    Ok(messages)
}
