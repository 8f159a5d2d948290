//! Error types for cat-core.

use thiserror::Error;

/// Result type alias using cat-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving an adaptive testing session.
#[derive(Error, Debug)]
pub enum Error {
    /// Candidate pool empty after exclusion and constraint filtering
    #[error("no eligible items remain in the candidate pool after filtering")]
    NoEligibleItems,

    /// Operation attempted on a session already in a terminal status
    #[error("session {session_id} is already terminal ({status})")]
    SessionTerminated { session_id: String, status: String },

    /// Finalization attempted before the session reached a terminal status
    #[error("session {session_id} has not terminated yet ({status})")]
    SessionNotTerminated { session_id: String, status: String },

    /// Malformed IRT parameters supplied by the item bank
    #[error("invalid IRT parameters for item {item_id}: {reason}")]
    InvalidParameter { item_id: String, reason: String },

    /// An item was recorded twice for the same session
    #[error("item {item_id} was already administered in session {session_id}")]
    ItemAlreadyAdministered { item_id: String, session_id: String },

    /// Session id unknown to the session store
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Boundary store failure (item bank, session store, history provider)
    #[error("store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a terminated-session error.
    pub fn session_terminated(session_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::SessionTerminated {
            session_id: session_id.into(),
            status: status.into(),
        }
    }

    /// Create a not-yet-terminated error.
    pub fn session_not_terminated(
        session_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self::SessionNotTerminated {
            session_id: session_id.into(),
            status: status.into(),
        }
    }

    /// Create an invalid-parameter error.
    pub fn invalid_parameter(item_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            item_id: item_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate-administration error.
    pub fn item_already_administered(
        item_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self::ItemAlreadyAdministered {
            item_id: item_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}
