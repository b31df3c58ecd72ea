//! Chatroom entity definitions

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::types::{DatabaseError, DatabaseResult};

/// Shared chat session created when two groups are matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chatroom {
    /// Canonical pair id of the two matched groups.
    pub id: String,
    pub participants: Vec<String>,
    pub group_ids: Vec<String>,
    pub created_at: String,
}

impl Chatroom {
    pub fn new(id: impl Into<String>, participants: Vec<String>, group_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            participants,
            group_ids,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub(crate) fn from_row(row: &SqliteRow) -> DatabaseResult<Self> {
        let id: String = row.try_get("id")?;
        let participants: String = row.try_get("participants")?;
        let group_ids: String = row.try_get("group_ids")?;

        Ok(Self {
            participants: serde_json::from_str(&participants)
                .map_err(|e| DatabaseError::corrupt(&id, format!("participants: {e}")))?,
            group_ids: serde_json::from_str(&group_ids)
                .map_err(|e| DatabaseError::corrupt(&id, format!("group_ids: {e}")))?,
            created_at: row.try_get("created_at")?,
            id,
        })
    }
}
