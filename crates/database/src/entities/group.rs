//! Group entity definitions

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::types::{DatabaseError, DatabaseResult};

/// Joins the two group ids of a chatroom id, so group ids may not contain it.
pub const PAIR_SEPARATOR: char = '_';

pub(crate) const GROUP_COLUMNS: &str =
    "id, name, status, member_ids, matched_group_id, version, created_at, updated_at";

/// A group of users looking for another group of the same size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: Option<String>,
    pub status: GroupStatus,
    pub member_ids: Vec<String>,
    /// Set exactly when `status` is `Matched`.
    pub matched_group_id: Option<String>,
    /// Optimistic-concurrency counter, bumped by every committed write.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    /// Caller-chosen id; a cuid is generated when absent.
    pub id: Option<String>,
    pub name: Option<String>,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Idle,
    Seeking,
    Matched,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Idle => "idle",
            GroupStatus::Seeking => "seeking",
            GroupStatus::Matched => "matched",
        }
    }

    /// Strict parse; unknown values are a corrupt document, not a default.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(GroupStatus::Idle),
            "seeking" => Some(GroupStatus::Seeking),
            "matched" => Some(GroupStatus::Matched),
            _ => None,
        }
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Group {
    pub fn new(request: &CreateGroupRequest) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: request.id.clone().unwrap_or_else(cuid2::create_id),
            name: request.name.clone(),
            status: GroupStatus::Idle,
            member_ids: request.member_ids.clone(),
            matched_group_id: None,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == user_id)
    }

    pub fn is_seeking(&self) -> bool {
        self.status == GroupStatus::Seeking
    }

    pub fn is_matched(&self) -> bool {
        self.status == GroupStatus::Matched
    }

    /// Copy of this group moved to `Matched` against `peer_id`.
    pub fn matched_with(&self, peer_id: &str) -> Self {
        Self {
            status: GroupStatus::Matched,
            matched_group_id: Some(peer_id.to_string()),
            ..self.clone()
        }
    }

    /// Copy of this group with a new status and no peer.
    pub fn with_status(&self, status: GroupStatus) -> Self {
        Self {
            status,
            matched_group_id: None,
            ..self.clone()
        }
    }

    /// Validate group invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Group id cannot be empty".to_string());
        }

        if self.id.contains(PAIR_SEPARATOR) {
            return Err(format!(
                "Group id {} cannot contain '{PAIR_SEPARATOR}'",
                self.id
            ));
        }

        if self.status != GroupStatus::Idle && self.member_ids.is_empty() {
            return Err(format!("Group {} has no members", self.id));
        }

        match (&self.status, &self.matched_group_id) {
            (GroupStatus::Matched, None) => {
                Err(format!("Group {} is matched without a peer", self.id))
            }
            (GroupStatus::Matched, Some(peer)) if peer == &self.id => {
                Err(format!("Group {} is matched with itself", self.id))
            }
            (GroupStatus::Matched, Some(_)) => Ok(()),
            (_, Some(_)) => Err(format!(
                "Group {} has a peer but status {}",
                self.id, self.status
            )),
            (_, None) => Ok(()),
        }
    }

    pub(crate) fn from_row(row: &SqliteRow) -> DatabaseResult<Self> {
        let id: String = row.try_get("id")?;
        let status_str: String = row.try_get("status")?;
        let status = GroupStatus::parse(&status_str)
            .ok_or_else(|| DatabaseError::corrupt(&id, format!("unknown status {status_str}")))?;
        let member_json: String = row.try_get("member_ids")?;
        let member_ids: Vec<String> = serde_json::from_str(&member_json)
            .map_err(|e| DatabaseError::corrupt(&id, format!("member_ids: {e}")))?;

        Ok(Self {
            name: row.try_get("name")?,
            status,
            member_ids,
            matched_group_id: row.try_get("matched_group_id")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            id,
        })
    }
}
