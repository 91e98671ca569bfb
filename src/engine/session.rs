//! Messaging Session
//!
//! The session owns the two in-memory projections (conversation summary
//! list and open thread) for the lifetime of the messaging view and is
//! their single writer. Long-running work (bulk fetch, thread fetch,
//! send, label backfill) runs as spawned tasks that deliver results over
//! channels; [`MessagingSession::poll`] drains those channels and the
//! insert-event subscription, so all mutation happens on the caller's
//! task and no locking is needed.
//!
//! # Selection Generations
//!
//! Every `select` bumps a generation counter and tags its fetch with it.
//! A fetch that completes after the user has moved on carries a stale
//! generation and is discarded, so a slow load can never overwrite a
//! newer selection.
//!
//! # Send Path
//!
//! `send` never appends to the projections. The inserted message becomes
//! visible only when the subscription echoes it back through the same
//! merge the remote peer's messages take, which is what makes the
//! sender's view and the peer's view converge by construction.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;

use uuid::Uuid;

use crate::shared::config::AppConfig;
use crate::shared::error::ChatError;
use crate::shared::messaging::{ConversationKey, ConversationSummary, Message, NewMessage};
use crate::store::{Directory, InsertSubscription, MessageStore, SubscriptionLost};

use super::aggregate::aggregate;
use super::merge::{merge_into_summaries, merge_into_thread, SummaryMerge};
use super::thread::{load_thread, OpenThread};

/// Validate and submit an outgoing message.
///
/// The store assigns `id` and `created_at`; the caller must NOT append
/// the result to any projection - display happens via the insert event.
pub async fn send_message<S>(
    store: &S,
    key: &ConversationKey,
    local_user_id: Uuid,
    content: &str,
) -> Result<Message, ChatError>
where
    S: MessageStore + ?Sized,
{
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::validation("content", "message text cannot be empty"));
    }
    let draft = NewMessage::for_conversation(key, local_user_id, trimmed.to_string());
    store
        .insert_message(draft)
        .await
        .map_err(ChatError::SendFailed)
}

/// Resolved labels for one conversation
struct ConversationLabels {
    other_user_name: Option<String>,
    product_name: Option<String>,
}

struct PendingThreadLoad {
    generation: u64,
    key: ConversationKey,
    rx: Receiver<Result<Vec<Message>, ChatError>>,
}

struct PendingLabelLookup {
    key: ConversationKey,
    rx: Receiver<ConversationLabels>,
}

/// One user's messaging view session
pub struct MessagingSession<S, D>
where
    S: MessageStore + ?Sized + 'static,
    D: Directory + ?Sized + 'static,
{
    store: Arc<S>,
    directory: Arc<D>,
    config: AppConfig,
    local_user_id: Uuid,

    summaries: Vec<ConversationSummary>,
    thread: Option<OpenThread>,
    selected: Option<ConversationKey>,
    selection_generation: u64,
    /// Events for the selected key observed while its load is in flight
    buffered_selected_events: Vec<Message>,

    subscription: Option<InsertSubscription>,

    compose_input: String,
    last_error: Option<ChatError>,

    pending_summaries: Option<Receiver<Result<Vec<ConversationSummary>, ChatError>>>,
    pending_threads: Vec<PendingThreadLoad>,
    pending_send: Option<Receiver<Result<Message, ChatError>>>,
    pending_labels: Vec<PendingLabelLookup>,

    closed: bool,
}

impl<S, D> MessagingSession<S, D>
where
    S: MessageStore + ?Sized + 'static,
    D: Directory + ?Sized + 'static,
{
    /// Start a session: subscribe to inserts and kick off the bulk fetch.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(store: Arc<S>, directory: Arc<D>, local_user_id: Uuid, config: AppConfig) -> Self {
        let subscription = Some(store.subscribe_inserts());
        let mut session = Self {
            store,
            directory,
            config,
            local_user_id,
            summaries: Vec::new(),
            thread: None,
            selected: None,
            selection_generation: 0,
            buffered_selected_events: Vec::new(),
            subscription,
            compose_input: String::new(),
            last_error: None,
            pending_summaries: None,
            pending_threads: Vec::new(),
            pending_send: None,
            pending_labels: Vec::new(),
            closed: false,
        };
        session.refresh_conversations();
        tracing::info!("[Session] started for user {}", local_user_id);
        session
    }

    /// The ordered conversation summary list
    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    /// The open thread, if one has been loaded
    pub fn thread(&self) -> Option<&OpenThread> {
        self.thread.as_ref()
    }

    /// The currently selected conversation
    pub fn selected(&self) -> Option<&ConversationKey> {
        self.selected.as_ref()
    }

    /// The local user this session belongs to
    pub fn local_user_id(&self) -> Uuid {
        self.local_user_id
    }

    /// Current compose buffer contents
    pub fn input(&self) -> &str {
        &self.compose_input
    }

    /// Replace the compose buffer contents
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.compose_input = text.into();
    }

    /// Take the most recent error, if any
    pub fn take_error(&mut self) -> Option<ChatError> {
        self.last_error.take()
    }

    /// Whether the bulk conversation fetch is still in flight
    pub fn is_loading_conversations(&self) -> bool {
        self.pending_summaries.is_some()
    }

    /// Whether a thread fetch for the current selection is in flight
    pub fn is_loading_thread(&self) -> bool {
        self.pending_threads
            .iter()
            .any(|p| p.generation == self.selection_generation)
    }

    /// Whether a send is in flight
    pub fn is_sending(&self) -> bool {
        self.pending_send.is_some()
    }

    /// Whether the session has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Re-run the bulk fetch and aggregation (also the retry path after
    /// a `StoreUnavailable`)
    pub fn refresh_conversations(&mut self) {
        if self.closed {
            return;
        }
        let (tx, rx) = mpsc::channel();
        self.pending_summaries = Some(rx);

        let store = Arc::clone(&self.store);
        let directory = Arc::clone(&self.directory);
        let local_user_id = self.local_user_id;
        let preview_len = self.config.preview_length;
        tokio::spawn(async move {
            let result = match store.messages_involving(local_user_id).await {
                Ok(records) => {
                    Ok(aggregate(records, local_user_id, directory.as_ref(), preview_len).await)
                }
                Err(e) => Err(ChatError::StoreUnavailable(e)),
            };
            let _ = tx.send(result);
        });
    }

    /// Select a conversation and start loading its history
    pub fn select(&mut self, key: ConversationKey) {
        if self.closed {
            return;
        }
        self.selection_generation += 1;
        let generation = self.selection_generation;
        self.selected = Some(key.clone());
        self.buffered_selected_events.clear();

        let (tx, rx) = mpsc::channel();
        self.pending_threads.push(PendingThreadLoad {
            generation,
            key: key.clone(),
            rx,
        });

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let result = load_thread(store.as_ref(), &key).await;
            let _ = tx.send(result);
        });
    }

    /// Submit the compose buffer to the selected conversation.
    ///
    /// Validation failures are returned immediately and leave the buffer
    /// untouched; store rejection surfaces later through [`Self::poll`] /
    /// [`Self::take_error`], also preserving the buffer. The buffer is
    /// cleared only once the store accepts the message.
    pub fn send(&mut self) -> Result<(), ChatError> {
        if self.closed {
            return Err(ChatError::validation("session", "session is closed"));
        }
        let content = self.compose_input.trim();
        if content.is_empty() {
            return Err(ChatError::validation("content", "message text cannot be empty"));
        }
        let Some(key) = self.selected.clone() else {
            return Err(ChatError::validation("conversation", "no conversation selected"));
        };

        let (tx, rx) = mpsc::channel();
        self.pending_send = Some(rx);

        let store = Arc::clone(&self.store);
        let local_user_id = self.local_user_id;
        let content = content.to_string();
        tokio::spawn(async move {
            let result = send_message(store.as_ref(), &key, local_user_id, &content).await;
            let _ = tx.send(result);
        });
        Ok(())
    }

    /// Drain completed operations and buffered insert events, applying
    /// them to the projections. Call once per UI frame or wakeup.
    pub fn poll(&mut self) {
        if self.closed {
            return;
        }
        self.poll_summaries();
        self.poll_thread_loads();
        self.poll_send();
        self.poll_labels();
        self.poll_insert_events();
    }

    /// Tear down the session: cancel the subscription, drop in-flight
    /// work, and discard the projections. No effect on the store.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.pending_summaries = None;
        self.pending_threads.clear();
        self.pending_send = None;
        self.pending_labels.clear();
        self.buffered_selected_events.clear();
        self.summaries.clear();
        self.thread = None;
        self.selected = None;
        tracing::info!("[Session] closed for user {}", self.local_user_id);
    }

    fn poll_summaries(&mut self) {
        let Some(rx) = &self.pending_summaries else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(summaries)) => {
                self.pending_summaries = None;
                self.install_summaries(summaries);
            }
            Ok(Err(e)) => {
                self.pending_summaries = None;
                tracing::warn!("[Session] conversation refresh failed: {}", e);
                self.last_error = Some(e);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_summaries = None;
                tracing::warn!("[Session] conversation refresh task dropped");
            }
        }
    }

    /// Install a fetched summary list, folding back anything the live
    /// stream delivered while the fetch was in flight.
    fn install_summaries(&mut self, fetched: Vec<ConversationSummary>) {
        let previous = std::mem::take(&mut self.summaries);
        self.summaries = fetched;
        for summary in previous {
            match self.summaries.iter_mut().find(|s| s.key == summary.key) {
                Some(current) => {
                    if summary.last_timestamp > current.last_timestamp {
                        current.last_message = summary.last_message;
                        current.last_message_id = summary.last_message_id;
                        current.last_timestamp = summary.last_timestamp;
                    }
                }
                None => self.summaries.push(summary),
            }
        }
        self.summaries.sort_by(|a, b| {
            (b.last_timestamp, b.last_message_id).cmp(&(a.last_timestamp, a.last_message_id))
        });
    }

    fn poll_thread_loads(&mut self) {
        let mut completed = Vec::new();
        self.pending_threads.retain(|pending| match pending.rx.try_recv() {
            Ok(result) => {
                completed.push((pending.generation, pending.key.clone(), result));
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                tracing::warn!("[Session] thread fetch task dropped");
                false
            }
        });
        for (generation, key, result) in completed {
            self.apply_thread_result(generation, key, result);
        }
    }

    fn apply_thread_result(
        &mut self,
        generation: u64,
        key: ConversationKey,
        result: Result<Vec<Message>, ChatError>,
    ) {
        if generation != self.selection_generation {
            tracing::debug!("[Session] discarding thread fetch for superseded selection");
            return;
        }
        match result {
            Ok(messages) => {
                tracing::debug!("[Session] thread loaded with {} messages", messages.len());
                self.install_thread(key, messages);
            }
            Err(e) => {
                // Previously loaded thread stays visible.
                tracing::warn!("[Session] thread fetch failed: {}", e);
                self.last_error = Some(e);
            }
        }
    }

    /// Install a loaded thread, folding in events that raced the fetch.
    fn install_thread(&mut self, key: ConversationKey, mut messages: Vec<Message>) {
        for event in self.buffered_selected_events.drain(..) {
            if key.matches(&event) {
                merge_into_thread(&mut messages, &event);
            }
        }
        if let Some(existing) = self.thread.take() {
            if existing.key == key {
                for message in existing.messages {
                    merge_into_thread(&mut messages, &message);
                }
            }
        }
        self.thread = Some(OpenThread { key, messages });
    }

    fn poll_send(&mut self) {
        let Some(rx) = &self.pending_send else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(message)) => {
                self.pending_send = None;
                tracing::debug!("[Session] send accepted as message {}", message.id);
                self.compose_input.clear();
            }
            Ok(Err(e)) => {
                // Input preserved so the user can retry.
                self.pending_send = None;
                tracing::warn!("[Session] send failed: {}", e);
                self.last_error = Some(e);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_send = None;
                tracing::warn!("[Session] send task dropped");
            }
        }
    }

    fn poll_labels(&mut self) {
        let mut resolved = Vec::new();
        self.pending_labels.retain(|pending| match pending.rx.try_recv() {
            Ok(labels) => {
                resolved.push((pending.key.clone(), labels));
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => false,
        });
        for (key, labels) in resolved {
            let Some(summary) = self.summaries.iter_mut().find(|s| s.key == key) else {
                continue;
            };
            if let Some(name) = labels.other_user_name {
                summary.other_user_name = name;
            }
            if let Some(title) = labels.product_name {
                summary.product_name = title;
            }
        }
    }

    fn poll_insert_events(&mut self) {
        loop {
            let next = match self.subscription.as_mut() {
                Some(subscription) => subscription.try_next(),
                None => return,
            };
            match next {
                Ok(Some(message)) => self.apply_insert(message),
                Ok(None) => return,
                Err(SubscriptionLost) => {
                    tracing::warn!("[Session] insert subscription lost, resubscribing");
                    self.subscription = Some(self.store.subscribe_inserts());
                    return;
                }
            }
        }
    }

    /// Apply one insert event to the projections
    fn apply_insert(&mut self, message: Message) {
        if !message.involves(self.local_user_id) {
            return;
        }

        if let Some(thread) = self.thread.as_mut() {
            if thread.key.matches(&message) && merge_into_thread(&mut thread.messages, &message) {
                tracing::debug!("[Merge] message {} merged into the open thread", message.id);
            }
        }
        if let Some(selected) = &self.selected {
            let load_in_flight = self
                .thread
                .as_ref()
                .map_or(true, |thread| thread.key != *selected);
            if load_in_flight && selected.matches(&message) {
                self.buffered_selected_events.push(message.clone());
            }
        }

        let outcome = merge_into_summaries(
            &mut self.summaries,
            &message,
            self.local_user_id,
            self.config.preview_length,
        );
        if outcome == SummaryMerge::Created {
            let key = ConversationKey::for_message(&message, self.local_user_id);
            self.spawn_label_lookup(key);
        }
    }

    /// Resolve labels for a summary the live stream created
    fn spawn_label_lookup(&mut self, key: ConversationKey) {
        let (tx, rx) = mpsc::channel();
        self.pending_labels.push(PendingLabelLookup {
            key: key.clone(),
            rx,
        });

        let directory = Arc::clone(&self.directory);
        let other_user_id = key.other_participant(self.local_user_id);
        let product_id = key.product_id();
        tokio::spawn(async move {
            let other_user_name = match directory.user_names(&[other_user_id]).await {
                Ok(mut names) => names.remove(&other_user_id),
                Err(e) => {
                    tracing::warn!("[Session] user name lookup degraded: {}", e);
                    None
                }
            };
            let product_name = match directory.product_titles(&[product_id]).await {
                Ok(mut titles) => titles.remove(&product_id),
                Err(e) => {
                    tracing::warn!("[Session] product title lookup degraded: {}", e);
                    None
                }
            };
            let _ = tx.send(ConversationLabels {
                other_user_name,
                product_name,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDirectory, MemoryStore};
    use assert_matches::assert_matches;

    fn session() -> MessagingSession<MemoryStore, MemoryDirectory> {
        MessagingSession::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryDirectory::new()),
            Uuid::new_v4(),
            AppConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_send_requires_selection() {
        let mut session = session();
        session.set_input("hello");
        let result = session.send();
        assert_matches!(result, Err(ChatError::Validation { field, .. }) if field == "conversation");
        assert_eq!(session.input(), "hello");
    }

    #[tokio::test]
    async fn test_send_rejects_blank_input() {
        let mut session = session();
        session.select(ConversationKey::new(
            session.local_user_id(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        ));
        session.set_input("   ");
        let result = session.send();
        assert_matches!(result, Err(ChatError::Validation { field, .. }) if field == "content");
        assert_eq!(session.input(), "   ");
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_work() {
        let mut session = session();
        session.close();
        assert!(session.is_closed());
        session.close();
        session.poll();
        session.refresh_conversations();
        assert!(session.is_closed());
        assert_matches!(session.send(), Err(ChatError::Validation { .. }));
    }
}
