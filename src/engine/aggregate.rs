//! Conversation Aggregator
//!
//! Turns one bulk fetch of the local user's messages into the ordered
//! conversation summary list. Grouping keeps only the latest message per
//! canonical key; display names and product titles are resolved with one
//! batched directory call each, so the whole operation costs
//! O(messages) + two lookup round trips regardless of how many
//! conversations exist.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::shared::messaging::{
    ConversationKey, ConversationSummary, Message, MessageRecord, UNKNOWN_PRODUCT,
};
use crate::store::Directory;

/// Group records by conversation, keeping the latest message per key.
///
/// Blank rows are skipped with a warning; everything else is normalized
/// at this boundary.
fn latest_per_key(
    records: Vec<MessageRecord>,
    local_user_id: Uuid,
) -> HashMap<ConversationKey, Message> {
    let mut latest: HashMap<ConversationKey, Message> = HashMap::new();
    for record in records {
        let id = record.id;
        let Some(message) = record.normalize() else {
            tracing::warn!("[Aggregate] skipping message {} with no usable content", id);
            continue;
        };
        let key = ConversationKey::for_message(&message, local_user_id);
        match latest.entry(key) {
            Entry::Occupied(mut entry) => {
                if message.sort_key() > entry.get().sort_key() {
                    entry.insert(message);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(message);
            }
        }
    }
    latest
}

/// Build the summary list from grouped latest messages and resolved
/// labels, ordered by `last_timestamp` descending.
fn build_summaries(
    latest: HashMap<ConversationKey, Message>,
    local_user_id: Uuid,
    names: &HashMap<Uuid, String>,
    titles: &HashMap<Uuid, String>,
    preview_len: usize,
) -> Vec<ConversationSummary> {
    let mut summaries: Vec<ConversationSummary> = latest
        .into_iter()
        .map(|(key, message)| {
            let other_user_id = key.other_participant(local_user_id);
            ConversationSummary {
                product_id: key.product_id(),
                other_user_id,
                other_user_name: names.get(&other_user_id).cloned().unwrap_or_default(),
                product_name: titles
                    .get(&key.product_id())
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
                last_message: message.preview(preview_len),
                last_message_id: message.id,
                last_timestamp: message.created_at,
                key,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        (b.last_timestamp, b.last_message_id).cmp(&(a.last_timestamp, a.last_message_id))
    });
    summaries
}

/// Aggregate a bulk fetch into the ordered conversation summary list.
///
/// Directory failures degrade to placeholders rather than failing the
/// aggregation; re-running on the same records yields identical output.
pub async fn aggregate<D>(
    records: Vec<MessageRecord>,
    local_user_id: Uuid,
    directory: &D,
    preview_len: usize,
) -> Vec<ConversationSummary>
where
    D: Directory + ?Sized,
{
    let latest = latest_per_key(records, local_user_id);

    let other_ids: Vec<Uuid> = latest
        .keys()
        .map(|key| key.other_participant(local_user_id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let product_ids: Vec<Uuid> = latest
        .keys()
        .map(|key| key.product_id())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let names = match directory.user_names(&other_ids).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!("[Aggregate] user name lookup degraded: {}", e);
            HashMap::new()
        }
    };
    let titles = match directory.product_titles(&product_ids).await {
        Ok(titles) => titles,
        Err(e) => {
            tracing::warn!("[Aggregate] product title lookup degraded: {}", e);
            HashMap::new()
        }
    };

    build_summaries(latest, local_user_id, &names, &titles, preview_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDirectory;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn record(id: i64, sender: Uuid, receiver: Uuid, product: Uuid, t: i64) -> MessageRecord {
        MessageRecord {
            id,
            sender_id: sender,
            receiver_id: receiver,
            product_id: product,
            content: Some(format!("message {}", id)),
            body: None,
            created_at: Utc.timestamp_opt(t, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_two_directions_aggregate_to_one_summary() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let directory = MemoryDirectory::new();
        directory.insert_user(b, "Bea Seller").await;
        directory.insert_product(p, "Vintage Lamp").await;

        let records = vec![record(1, a, b, p, 10), record(2, b, a, p, 20)];
        let summaries = aggregate(records, a, &directory, 80).await;

        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.other_user_id, b);
        assert_eq!(summary.other_user_name, "Bea Seller");
        assert_eq!(summary.product_name, "Vintage Lamp");
        assert_eq!(summary.last_message_id, 2);
        assert_eq!(summary.last_timestamp, Utc.timestamp_opt(20, 0).unwrap());
    }

    #[tokio::test]
    async fn test_summaries_ordered_newest_first() {
        let (a, b, c, p, q) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let directory = MemoryDirectory::new();

        let records = vec![
            record(1, a, b, p, 10),
            record(2, c, a, q, 30),
            record(3, b, a, p, 20),
        ];
        let summaries = aggregate(records, a, &directory, 80).await;

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].other_user_id, c);
        assert_eq!(summaries[1].other_user_id, b);
    }

    #[tokio::test]
    async fn test_missing_lookup_degrades_to_placeholder() {
        let (a, b, c, p, q) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let directory = MemoryDirectory::new();
        directory.insert_user(c, "Cal Resolved").await;
        directory.insert_product(q, "Garden Chair").await;

        let records = vec![record(1, a, b, p, 10), record(2, c, a, q, 20)];
        let summaries = aggregate(records, a, &directory, 80).await;

        assert_eq!(summaries.len(), 2);
        let unresolved = summaries.iter().find(|s| s.other_user_id == b).unwrap();
        assert_eq!(unresolved.other_user_name, "");
        assert_eq!(unresolved.product_name, UNKNOWN_PRODUCT);
        let resolved = summaries.iter().find(|s| s.other_user_id == c).unwrap();
        assert_eq!(resolved.other_user_name, "Cal Resolved");
        assert_eq!(resolved.product_name, "Garden Chair");
    }

    #[tokio::test]
    async fn test_blank_rows_are_skipped() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let directory = MemoryDirectory::new();

        let mut blank = record(3, b, a, p, 30);
        blank.content = Some("   ".to_string());
        let records = vec![record(1, a, b, p, 10), blank];
        let summaries = aggregate(records, a, &directory, 80).await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].last_message_id, 1);
    }

    #[tokio::test]
    async fn test_aggregate_is_idempotent() {
        let (a, b, c, p, q) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let directory = MemoryDirectory::new();
        directory.insert_user(b, "Bea Seller").await;

        let records = vec![
            record(1, a, b, p, 10),
            record(2, b, a, p, 20),
            record(3, a, c, q, 20),
            record(4, c, a, q, 15),
        ];
        let first = aggregate(records.clone(), a, &directory, 80).await;
        let second = aggregate(records, a, &directory, 80).await;
        assert_eq!(first, second);
    }
}
