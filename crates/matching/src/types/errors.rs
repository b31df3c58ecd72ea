//! Error types for the matching core.

use groupting_database::{DatabaseError, GroupStatus};
use thiserror::Error;

/// Result type alias for matching operations
pub type MatchResult<T> = Result<T, MatchError>;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Group not found: {id}")]
    GroupNotFound { id: String },

    /// The group left the seeking state before this transaction read it.
    #[error("Group {id} is not seeking (status {status})")]
    GroupNotSeeking { id: String, status: GroupStatus },

    #[error("Group {id} disappeared before its chatroom was created")]
    GroupMissing { id: String },

    #[error("User {id} has no user document")]
    UserMissing { id: String },

    #[error("Group {id} cannot be matched with itself")]
    SelfMatch { id: String },

    #[error("Group {id} is not matched with {expected}")]
    PeerMismatch { id: String, expected: String },

    /// A chatroom with this pair's id exists but belongs to other groups.
    #[error("Chatroom {id} belongs to {found:?}, not {expected:?}")]
    ChatroomMismatch {
        id: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Transaction conflict: {message}")]
    TransactionConflict { message: String },

    #[error("Database error: {0}")]
    Store(DatabaseError),
}

impl MatchError {
    pub fn group_not_found(id: impl Into<String>) -> Self {
        Self::GroupNotFound { id: id.into() }
    }

    pub fn group_not_seeking(id: impl Into<String>, status: GroupStatus) -> Self {
        Self::GroupNotSeeking {
            id: id.into(),
            status,
        }
    }

    pub fn group_missing(id: impl Into<String>) -> Self {
        Self::GroupMissing { id: id.into() }
    }

    pub fn user_missing(id: impl Into<String>) -> Self {
        Self::UserMissing { id: id.into() }
    }

    pub fn peer_mismatch(id: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::PeerMismatch {
            id: id.into(),
            expected: expected.into(),
        }
    }

    /// Another path already resolved the situation; nothing to report.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::GroupNotSeeking { .. } | Self::GroupNotFound { .. })
    }

    /// Worth running the same transaction again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransactionConflict { .. } => true,
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Referenced documents are missing or inconsistent.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            Self::GroupMissing { .. }
                | Self::UserMissing { .. }
                | Self::SelfMatch { .. }
                | Self::PeerMismatch { .. }
                | Self::ChatroomMismatch { .. }
                | Self::Store(DatabaseError::Corrupt { .. })
        )
    }
}

impl From<DatabaseError> for MatchError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(message) => Self::TransactionConflict { message },
            other => Self::Store(other),
        }
    }
}
