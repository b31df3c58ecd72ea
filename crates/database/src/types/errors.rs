//! Error types for the database layer

use thiserror::Error;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    /// Another transaction committed first against a document this one read.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Corrupt document {id}: {message}")]
    Corrupt { id: String, message: String },
}

impl DatabaseError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn corrupt(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Whether running the same operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unavailable(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                if db.is_unique_violation() {
                    return Self::Conflict(err.to_string());
                }
                // Extended result codes carry the primary code in the low byte,
                // so BUSY_SNAPSHOT (517) lands here alongside plain BUSY.
                let primary = db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => Self::Conflict(err.to_string()),
                    _ => Self::QueryError(err.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            sqlx::Error::Migrate(_) => Self::MigrationError(err.to_string()),
            _ => Self::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::QueryError(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DatabaseError::conflict("stale").is_retryable());
        assert!(DatabaseError::Unavailable("pool".into()).is_retryable());
        assert!(!DatabaseError::not_found("group g1").is_retryable());
        assert!(!DatabaseError::corrupt("g1", "bad status").is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::Unavailable(_)));
    }

    #[test]
    fn test_row_not_found_is_query_error() {
        let err = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::QueryError(_)));
        assert!(!err.is_conflict());
    }
}
