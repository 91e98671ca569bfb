//! Message Data Structures
//!
//! A message is immutable once created: the store assigns `id` and
//! `created_at` on insert, and nothing in this crate ever updates or
//! deletes one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message exchanged between two users about one listed item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message ID, assigned by the store on insert; ascending
    /// enough to break ordering ties
    pub id: i64,
    /// User who sent the message
    pub sender_id: Uuid,
    /// User who receives the message
    pub receiver_id: Uuid,
    /// The listing this conversation is about
    pub product_id: Uuid,
    /// Message text, non-empty after trimming
    pub content: String,
    /// When the message was created (server-assigned, primary ordering key)
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Check whether a user is one of the two participants
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// Ordering key: `created_at` first, `id` breaks ties
    pub fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }

    /// Get a preview of the message (first N characters)
    pub fn preview(&self, max_len: usize) -> String {
        if self.content.chars().count() <= max_len {
            self.content.clone()
        } else {
            let mut preview: String = self.content.chars().take(max_len.saturating_sub(3)).collect();
            preview.push_str("...");
            preview
        }
    }
}

/// The storage-boundary shape of a message row
///
/// Early revisions of the schema stored the text in a `body` column; the
/// current schema uses `content`. Both are carried here and collapsed into
/// the single canonical field by [`MessageRecord::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub content: Option<String>,
    /// Legacy text column, read-only
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Parse a record from a wire payload.
    ///
    /// The insert-event streams the store collaborators speak deliver
    /// rows as JSON; legacy payloads carry `body` instead of `content`.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Collapse the record into a canonical [`Message`].
    ///
    /// Picks `content`, falls back to the legacy `body` field, and trims.
    /// Returns `None` for rows with no usable text; callers skip those
    /// with a warning rather than failing the whole batch.
    pub fn normalize(self) -> Option<Message> {
        let text = self.content.or(self.body)?;
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Message {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            product_id: self.product_id,
            content: text.to_string(),
            created_at: self.created_at,
        })
    }
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            product_id: message.product_id,
            content: Some(message.content),
            body: None,
            created_at: message.created_at,
        }
    }
}

/// A draft message submitted to the store for insertion
///
/// The store assigns `id` and `created_at`; the resulting [`Message`]
/// becomes visible to the sender only via the insert-event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub product_id: Uuid,
    pub content: String,
}

impl NewMessage {
    /// Build a draft addressed to the counterparty of a conversation
    pub fn for_conversation(
        key: &super::ConversationKey,
        sender_id: Uuid,
        content: String,
    ) -> Self {
        Self {
            sender_id,
            receiver_id: key.other_participant(sender_id),
            product_id: key.product_id(),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(content: Option<&str>, body: Option<&str>) -> MessageRecord {
        MessageRecord {
            id: 1,
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            content: content.map(|s| s.to_string()),
            body: body.map(|s| s.to_string()),
            created_at: Utc.timestamp_opt(10, 0).unwrap(),
        }
    }

    #[test]
    fn test_from_json_accepts_legacy_wire_payloads() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let product = Uuid::new_v4();
        let payload = format!(
            r#"{{"id":7,"sender_id":"{}","receiver_id":"{}","product_id":"{}","body":"old wire shape","created_at":"2024-03-01T12:00:00Z"}}"#,
            sender, receiver, product
        );

        let record = MessageRecord::from_json(&payload).unwrap();
        assert_eq!(record.id, 7);
        assert!(record.content.is_none());
        let message = record.normalize().unwrap();
        assert_eq!(message.content, "old wire shape");
    }

    #[test]
    fn test_normalize_prefers_content() {
        let message = record(Some("hello"), Some("old text")).normalize().unwrap();
        assert_eq!(message.content, "hello");
    }

    #[test]
    fn test_normalize_falls_back_to_legacy_body() {
        let message = record(None, Some("  from the old column  ")).normalize().unwrap();
        assert_eq!(message.content, "from the old column");
    }

    #[test]
    fn test_normalize_drops_blank_rows() {
        assert!(record(Some("   "), None).normalize().is_none());
        assert!(record(None, None).normalize().is_none());
    }

    #[test]
    fn test_involves() {
        let message = record(Some("hi"), None).normalize().unwrap();
        assert!(message.involves(message.sender_id));
        assert!(message.involves(message.receiver_id));
        assert!(!message.involves(Uuid::new_v4()));
    }

    #[test]
    fn test_preview_short_message_unchanged() {
        let message = record(Some("short"), None).normalize().unwrap();
        assert_eq!(message.preview(80), "short");
    }

    #[test]
    fn test_preview_truncates_long_message() {
        let mut message = record(Some("x"), None).normalize().unwrap();
        message.content = "a".repeat(100);
        let preview = message.preview(10);
        assert_eq!(preview.chars().count(), 10);
        assert!(preview.ends_with("..."));
    }
}
