//! Repository for group data access operations.

use sqlx::SqlitePool;
use tracing::info;

use crate::entities::group::GROUP_COLUMNS;
use crate::entities::{CreateGroupRequest, Group, GroupStatus};
use crate::feed::ChangeFeed;
use crate::store::StoreTransaction;
use crate::types::{DatabaseError, DatabaseResult};

/// Repository for group database operations
#[derive(Debug, Clone)]
pub struct GroupRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl GroupRepository {
    /// Create a new group repository
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    /// Find group by ID
    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Group>> {
        let row = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Group::from_row).transpose()
    }

    /// Groups currently seeking a match, other than `self_id`, oldest first.
    ///
    /// This is a plain read; the result may already be stale when it returns.
    pub async fn find_seeking_except(&self, self_id: &str) -> DatabaseResult<Vec<Group>> {
        let rows = sqlx::query(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE status = ? AND id != ? ORDER BY updated_at, id"
        ))
        .bind(GroupStatus::Seeking.as_str())
        .bind(self_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Group::from_row).collect()
    }

    pub async fn find_by_status(&self, status: GroupStatus) -> DatabaseResult<Vec<Group>> {
        let rows = sqlx::query(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE status = ? ORDER BY updated_at, id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Group::from_row).collect()
    }

    pub async fn list(&self) -> DatabaseResult<Vec<Group>> {
        let rows = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM groups ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Group::from_row).collect()
    }

    /// Create a new idle group
    pub async fn create(&self, request: &CreateGroupRequest) -> DatabaseResult<Group> {
        let group = Group::new(request);

        let mut tx = StoreTransaction::begin(&self.pool, &self.feed).await?;
        tx.insert_group(&group).await?;
        tx.commit().await?;

        info!(
            group_id = %group.id,
            members = group.member_count(),
            "created group"
        );
        Ok(group)
    }

    /// Client action: make the group available for pairing.
    ///
    /// Writing `seeking` onto a group that is already seeking still commits,
    /// which re-arms the seeking trigger.
    pub async fn start_seeking(&self, id: &str) -> DatabaseResult<Group> {
        let mut tx = StoreTransaction::begin(&self.pool, &self.feed).await?;
        let current = tx
            .read_group(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(format!("group {id}")))?;

        if current.is_matched() {
            return Err(DatabaseError::validation(format!(
                "group {id} is already matched"
            )));
        }
        if current.member_ids.is_empty() {
            return Err(DatabaseError::validation(format!(
                "group {id} has no members"
            )));
        }

        let next = tx
            .update_group(&current, current.with_status(GroupStatus::Seeking))
            .await?;
        tx.commit().await?;

        info!(group_id = %id, members = next.member_count(), "group is seeking a match");
        Ok(next)
    }

    /// Client action: withdraw a seeking group. Matched groups cannot withdraw.
    pub async fn stop_seeking(&self, id: &str) -> DatabaseResult<Group> {
        let mut tx = StoreTransaction::begin(&self.pool, &self.feed).await?;
        let current = tx
            .read_group(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(format!("group {id}")))?;

        match current.status {
            GroupStatus::Idle => Ok(current),
            GroupStatus::Matched => Err(DatabaseError::validation(format!(
                "group {id} is matched and awaiting its chatroom"
            ))),
            GroupStatus::Seeking => {
                let next = tx
                    .update_group(&current, current.with_status(GroupStatus::Idle))
                    .await?;
                tx.commit().await?;
                info!(group_id = %id, "group stopped seeking");
                Ok(next)
            }
        }
    }
}
