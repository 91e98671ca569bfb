//! Shared Error Types
//!
//! This module defines the error taxonomy for the messaging core.
//!
//! # Error Categories
//!
//! - `StoreError` - failures reported by the store and directory
//!   collaborators
//! - `ChatError` - failures surfaced by the engine to its caller
//!
//! Directory lookup degradation is deliberately NOT an error: a missing
//! display name or product title resolves to a placeholder and is logged,
//! never propagated. There is no fatal error in this core; every failure
//! leaves the session in a visible, retryable state.
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across
//! task boundaries.

use thiserror::Error;

/// Errors reported by the store and directory collaborators
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// The store could not be reached or the query failed
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Human-readable error message
        message: String,
    },

    /// The store rejected an insert
    #[error("insert rejected: {message}")]
    Rejected {
        /// Human-readable error message
        message: String,
    },
}

impl StoreError {
    /// Create a new unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a new rejected error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the messaging engine
///
/// Every variant is retryable by the caller: a failed fetch preserves the
/// previously loaded projections, a failed send preserves the compose
/// buffer.
#[derive(Debug, Error, Clone)]
pub enum ChatError {
    /// A bulk fetch or thread fetch failed; previously loaded state is
    /// preserved and retry is the caller's responsibility
    #[error("message store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// An outgoing message was rejected; the input text is preserved so
    /// the user can retry
    #[error("message could not be sent: {0}")]
    SendFailed(#[source] StoreError),

    /// Data validation error
    #[error("validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl ChatError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
