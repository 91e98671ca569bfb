//! Conversation Data Structures
//!
//! A conversation is the set of all messages between two users about one
//! listed item. Its identity is derived, never stored: the unordered
//! participant pair plus the product id. Direction must not affect the
//! identity, otherwise one logical conversation splits in two the moment
//! the counterparty replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;

/// Placeholder title used when a product cannot be resolved
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// Canonical, direction-free identity of a conversation
///
/// The participant pair is kept sorted so that `A -> B` and `B -> A`
/// messages about the same product map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    participant_low: Uuid,
    participant_high: Uuid,
    product_id: Uuid,
}

impl ConversationKey {
    /// Create a key from an unordered participant pair and a product
    pub fn new(a: Uuid, b: Uuid, product_id: Uuid) -> Self {
        let (participant_low, participant_high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            participant_low,
            participant_high,
            product_id,
        }
    }

    /// Derive the key for a message observed by `local_user_id`.
    ///
    /// The caller must only pass messages the local user participates in;
    /// the store fetch filter enforces this, so a violation here is a
    /// caller bug, not a recoverable condition.
    pub fn for_message(message: &Message, local_user_id: Uuid) -> Self {
        assert!(
            message.involves(local_user_id),
            "message {} does not involve the local user",
            message.id
        );
        Self::new(message.sender_id, message.receiver_id, message.product_id)
    }

    /// The participant pair, sorted
    pub fn participants(&self) -> (Uuid, Uuid) {
        (self.participant_low, self.participant_high)
    }

    /// The listing this conversation is about
    pub fn product_id(&self) -> Uuid {
        self.product_id
    }

    /// Check if a user is a participant
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }

    /// Get the other participant (for direct messages)
    pub fn other_participant(&self, local_user_id: Uuid) -> Uuid {
        debug_assert!(self.has_participant(local_user_id));
        if self.participant_low == local_user_id {
            self.participant_high
        } else {
            self.participant_low
        }
    }

    /// Check whether a message belongs to this conversation
    pub fn matches(&self, message: &Message) -> bool {
        self.product_id == message.product_id
            && *self == Self::new(message.sender_id, message.receiver_id, message.product_id)
    }
}

/// One entry in the conversation list
///
/// At most one summary exists per [`ConversationKey`]; `last_message` and
/// `last_timestamp` always reflect the chronologically latest message
/// known for that key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Canonical conversation identity
    pub key: ConversationKey,
    /// The listing this conversation is about
    pub product_id: Uuid,
    /// The counterparty
    pub other_user_id: Uuid,
    /// Display name of the counterparty (empty until resolved)
    pub other_user_name: String,
    /// Title of the listing ([`UNKNOWN_PRODUCT`] until resolved)
    pub product_name: String,
    /// Preview text of the latest message
    pub last_message: String,
    /// Id of the latest message (tie-breaker during aggregation)
    pub last_message_id: i64,
    /// Timestamp of the latest message
    pub last_timestamp: DateTime<Utc>,
}

impl ConversationSummary {
    /// Build a summary from the latest message of a conversation, with
    /// placeholder labels until the directory resolves them
    pub fn from_latest(key: ConversationKey, local_user_id: Uuid, latest: &Message, preview_len: usize) -> Self {
        let other_user_id = key.other_participant(local_user_id);
        Self {
            product_id: key.product_id(),
            key,
            other_user_id,
            other_user_name: String::new(),
            product_name: UNKNOWN_PRODUCT.to_string(),
            last_message: latest.preview(preview_len),
            last_message_id: latest.id,
            last_timestamp: latest.created_at,
        }
    }

    /// Update the latest-message fields
    pub fn update_last_message(&mut self, message: &Message, preview_len: usize) {
        self.last_message = message.preview(preview_len);
        self.last_message_id = message.id;
        self.last_timestamp = message.created_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(sender: Uuid, receiver: Uuid, product: Uuid) -> Message {
        Message {
            id: 1,
            sender_id: sender,
            receiver_id: receiver,
            product_id: product,
            content: "hello".to_string(),
            created_at: Utc.timestamp_opt(10, 0).unwrap(),
        }
    }

    #[test]
    fn test_key_is_direction_free() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(ConversationKey::new(a, b, p), ConversationKey::new(b, a, p));
    }

    #[test]
    fn test_key_is_observer_independent() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let sent = message(a, b, p);
        let received = message(b, a, p);
        assert_eq!(
            ConversationKey::for_message(&sent, a),
            ConversationKey::for_message(&received, a)
        );
        assert_eq!(
            ConversationKey::for_message(&sent, a),
            ConversationKey::for_message(&sent, b)
        );
    }

    #[test]
    fn test_key_separates_products() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let key1 = ConversationKey::new(a, b, Uuid::new_v4());
        let key2 = ConversationKey::new(a, b, Uuid::new_v4());
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_other_participant() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let key = ConversationKey::new(a, b, p);
        assert_eq!(key.other_participant(a), b);
        assert_eq!(key.other_participant(b), a);
    }

    #[test]
    fn test_matches_both_directions() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let key = ConversationKey::new(a, b, p);
        assert!(key.matches(&message(a, b, p)));
        assert!(key.matches(&message(b, a, p)));
        assert!(!key.matches(&message(a, b, Uuid::new_v4())));
        assert!(!key.matches(&message(a, Uuid::new_v4(), p)));
    }

    #[test]
    #[should_panic(expected = "does not involve the local user")]
    fn test_for_message_rejects_foreign_observer() {
        let m = message(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        ConversationKey::for_message(&m, Uuid::new_v4());
    }

    #[test]
    fn test_update_last_message() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let first = message(a, b, p);
        let key = ConversationKey::for_message(&first, a);
        let mut summary = ConversationSummary::from_latest(key, a, &first, 80);
        assert_eq!(summary.other_user_id, b);
        assert_eq!(summary.product_name, UNKNOWN_PRODUCT);

        let mut reply = message(b, a, p);
        reply.id = 2;
        reply.content = "second".to_string();
        reply.created_at = Utc.timestamp_opt(20, 0).unwrap();
        summary.update_last_message(&reply, 80);
        assert_eq!(summary.last_message, "second");
        assert_eq!(summary.last_message_id, 2);
        assert_eq!(summary.last_timestamp, reply.created_at);
    }
}
