//! User entity definitions

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::types::DatabaseResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub nickname: Option<String>,
    /// Current group or, once matched, the chatroom the user was moved into.
    pub current_group_id: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
    pub nickname: Option<String>,
    pub current_group_id: Option<String>,
}

impl User {
    pub fn new(request: &CreateUserRequest) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: request.id.clone(),
            nickname: request.nickname.clone(),
            current_group_id: request.current_group_id.clone(),
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Name shown to other users, falling back to a generic label.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or("user")
    }

    pub(crate) fn from_row(row: &SqliteRow) -> DatabaseResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            nickname: row.try_get("nickname")?,
            current_group_id: row.try_get("current_group_id")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
