//! MarketChat - Main Library
//!
//! MarketChat is the peer-to-peer messaging core of a marketplace
//! application: buyers and sellers exchange text messages scoped to a
//! specific listed item. This crate implements the conversation
//! aggregation and real-time synchronization engine behind that feature.
//!
//! # Overview
//!
//! The library provides:
//! - Derivation of canonical, direction-free conversation identities from
//!   a flat append-only message log
//! - Aggregation of that log into an ordered conversation summary list
//! - Ordered, deduplicated thread views that stay correct under
//!   duplicated and out-of-order event delivery
//! - A send pipeline whose messages become visible only through the same
//!   live-merge path that renders the remote peer's messages
//!
//! # Module Structure
//!
//! The library is organized into three main modules:
//!
//! - **`shared`** - Data structures and cross-cutting types
//!   - Message and conversation entities, configuration, error types
//!
//! - **`engine`** - The aggregation and synchronization core
//!   - Conversation aggregator, thread loader, live merge rules, and the
//!     session that orchestrates them
//!
//! - **`store`** - External collaborator interfaces and implementations
//!   - `MessageStore` and `Directory` traits, an in-memory store for
//!     tests and demos, and a Postgres store behind the `postgres`
//!     feature
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use marketchat::engine::MessagingSession;
//! use marketchat::shared::AppConfig;
//! use marketchat::store::{MemoryDirectory, MemoryStore};
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryStore::new());
//! let directory = Arc::new(MemoryDirectory::new());
//! let me = Uuid::new_v4();
//!
//! let mut session = MessagingSession::new(store, directory, me, AppConfig::default());
//! session.poll();
//! for conversation in session.conversations() {
//!     println!("{}: {}", conversation.product_name, conversation.last_message);
//! }
//! # }
//! ```
//!
//! # Concurrency Model
//!
//! One logical session per user. Fetches and sends run as spawned tasks
//! delivering results over channels that [`engine::MessagingSession::poll`]
//! drains; the session is the single writer of both in-memory projections
//! (summary list and open thread), so no locking is needed around them.
//! The insert subscription is at-least-once and best-effort-ordered; the
//! merge rules in [`engine::merge`] absorb duplicates and reordering.

/// Shared data structures and cross-cutting types
pub mod shared;

/// Conversation aggregation and live synchronization engine
pub mod engine;

/// Message store and directory collaborators
pub mod store;

/// Re-export commonly used types for convenience
pub use engine::MessagingSession;
pub use shared::error::{ChatError, StoreError};
pub use shared::messaging::{ConversationKey, ConversationSummary, Message};
pub use shared::AppConfig;
