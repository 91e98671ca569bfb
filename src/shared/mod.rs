//! Shared Module
//!
//! This module contains types and data structures used across the engine
//! and the store collaborators: the message and conversation entities,
//! configuration, and the error taxonomy. All entity types are designed
//! for serialization so they can travel over whatever transport the store
//! collaborator uses.

/// Application configuration
pub mod config;

/// Error types
pub mod error;

/// Messaging entities: messages, conversation keys, summaries
pub mod messaging;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{ChatError, StoreError};
pub use messaging::{ConversationKey, ConversationSummary, Message, MessageRecord, NewMessage};
