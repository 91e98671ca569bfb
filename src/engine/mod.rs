//! Conversation Aggregation and Live Synchronization Engine
//!
//! The engine turns a flat, append-only message log into two in-memory
//! projections - the conversation summary list and the open thread - and
//! keeps both correct while insert events arrive duplicated and out of
//! order.
//!
//! Control flow: on session start the aggregator performs one bulk fetch
//! and groups it into summaries. Selecting a conversation triggers the
//! thread loader. A long-lived subscription feeds the merge rules, which
//! update the open thread and the summary list; the send pipeline writes
//! to the store and relies on the echoed insert event, not a local
//! append, for the message to become visible.

pub mod aggregate;
pub mod merge;
pub mod session;
pub mod thread;

// Re-export the engine surface
pub use aggregate::aggregate;
pub use merge::{merge_into_summaries, merge_into_thread, SummaryMerge};
pub use session::{send_message, MessagingSession};
pub use thread::{load_thread, OpenThread};
