//! Repository for chatroom data access operations.

use sqlx::SqlitePool;

use crate::entities::Chatroom;
use crate::types::DatabaseResult;

/// Read-only access to chatrooms; they are only written inside finalization.
#[derive(Debug, Clone)]
pub struct ChatroomRepository {
    pool: SqlitePool,
}

impl ChatroomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Chatroom>> {
        let row = sqlx::query(
            "SELECT id, participants, group_ids, created_at FROM chatrooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Chatroom::from_row).transpose()
    }

    pub async fn list(&self) -> DatabaseResult<Vec<Chatroom>> {
        let rows = sqlx::query(
            "SELECT id, participants, group_ids, created_at FROM chatrooms ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Chatroom::from_row).collect()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chatrooms")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
