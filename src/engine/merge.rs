//! Live Merge Rules
//!
//! Every newly observed message flows through these two functions, whether
//! it came from the remote peer or is the echo of the local user's own
//! send. They are written for the at-least-once, best-effort-ordered
//! delivery contract: applying the same event twice, or applying events
//! out of `created_at` order, leaves the projections exactly as a single
//! in-order application would.

use uuid::Uuid;

use crate::shared::messaging::{ConversationKey, ConversationSummary, Message};

/// Outcome of merging an event into the summary list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMerge {
    /// A summary for a previously unseen conversation was created
    Created,
    /// An existing summary was refreshed and moved to the front
    Updated,
    /// The event was older than the summary's latest message
    Ignored,
}

/// Merge a message into an ordered thread.
///
/// Inserts at the sorted position by `(created_at, id)`. A message whose
/// id is already present is discarded; returns `false` in that case.
pub fn merge_into_thread(messages: &mut Vec<Message>, incoming: &Message) -> bool {
    if messages.iter().any(|m| m.id == incoming.id) {
        tracing::debug!("[Merge] discarding duplicate event for message {}", incoming.id);
        return false;
    }
    let at = messages.partition_point(|m| m.sort_key() <= incoming.sort_key());
    messages.insert(at, incoming.clone());
    true
}

/// Merge a message into the conversation summary list.
///
/// A strictly newer `created_at` than the existing summary replaces the
/// latest-message fields and moves the summary to the front; an event for
/// an unseen key creates a placeholder-labeled summary at the front;
/// anything else is ignored so a late-arriving, already-superseded event
/// cannot reorder the list.
pub fn merge_into_summaries(
    summaries: &mut Vec<ConversationSummary>,
    incoming: &Message,
    local_user_id: Uuid,
    preview_len: usize,
) -> SummaryMerge {
    let key = ConversationKey::for_message(incoming, local_user_id);

    match summaries.iter().position(|s| s.key == key) {
        Some(pos) => {
            if incoming.created_at > summaries[pos].last_timestamp {
                let mut summary = summaries.remove(pos);
                summary.update_last_message(incoming, preview_len);
                summaries.insert(0, summary);
                SummaryMerge::Updated
            } else {
                SummaryMerge::Ignored
            }
        }
        None => {
            let summary =
                ConversationSummary::from_latest(key, local_user_id, incoming, preview_len);
            summaries.insert(0, summary);
            SummaryMerge::Created
        }
    }
}
