//! Transactional access to groups, chatrooms and users.
//!
//! A [`StoreTransaction`] behaves like a first-committer-wins document
//! transaction: reads are fresh, and every write to a group or user is
//! conditional on the version read earlier in the same transaction. When
//! another writer got there first the write (or SQLite itself, with a
//! `BUSY_SNAPSHOT`) fails with [`DatabaseError::Conflict`] and nothing the
//! transaction staged becomes visible.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::entities::group::GROUP_COLUMNS;
use crate::entities::{Chatroom, Group, User};
use crate::feed::{ChangeFeed, GroupChange};
use crate::repos::{ChatroomRepository, GroupRepository, UserRepository};
use crate::types::{DatabaseError, DatabaseResult};

/// Handle over the document store shared by the coordinator and the repositories.
#[derive(Debug, Clone)]
pub struct MatchStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl MatchStore {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn groups(&self) -> GroupRepository {
        GroupRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn chatrooms(&self) -> ChatroomRepository {
        ChatroomRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub async fn begin(&self) -> DatabaseResult<StoreTransaction> {
        StoreTransaction::begin(&self.pool, &self.feed).await
    }
}

/// One atomic unit of reads and conditional writes.
///
/// Dropping the transaction without [`commit`](Self::commit) rolls it back.
pub struct StoreTransaction {
    tx: Transaction<'static, Sqlite>,
    feed: ChangeFeed,
    changes: Vec<GroupChange>,
}

impl StoreTransaction {
    pub(crate) async fn begin(pool: &SqlitePool, feed: &ChangeFeed) -> DatabaseResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self {
            tx,
            feed: feed.clone(),
            changes: Vec::new(),
        })
    }

    pub async fn read_group(&mut self, id: &str) -> DatabaseResult<Option<Group>> {
        let row = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(Group::from_row).transpose()
    }

    pub async fn insert_group(&mut self, group: &Group) -> DatabaseResult<()> {
        group.validate().map_err(DatabaseError::validation)?;

        sqlx::query(
            "INSERT INTO groups (id, name, status, member_ids, matched_group_id, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(group.status.as_str())
        .bind(serde_json::to_string(&group.member_ids)?)
        .bind(&group.matched_group_id)
        .bind(group.version)
        .bind(&group.created_at)
        .bind(&group.updated_at)
        .execute(&mut *self.tx)
        .await?;

        self.changes
            .push(GroupChange::new(&group.id, None, Some(group.clone())));
        Ok(())
    }

    /// Replace `current` with `next`, provided nobody wrote `current` since it was read.
    pub async fn update_group(&mut self, current: &Group, next: Group) -> DatabaseResult<Group> {
        if current.id != next.id {
            return Err(DatabaseError::validation(format!(
                "cannot rewrite group {} as {}",
                current.id, next.id
            )));
        }
        next.validate().map_err(DatabaseError::validation)?;

        let next = Group {
            version: current.version + 1,
            updated_at: Utc::now().to_rfc3339(),
            ..next
        };

        let result = sqlx::query(
            "UPDATE groups
             SET name = ?, status = ?, member_ids = ?, matched_group_id = ?, version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(&next.name)
        .bind(next.status.as_str())
        .bind(serde_json::to_string(&next.member_ids)?)
        .bind(&next.matched_group_id)
        .bind(next.version)
        .bind(&next.updated_at)
        .bind(&current.id)
        .bind(current.version)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::conflict(format!(
                "group {} changed after version {}",
                current.id, current.version
            )));
        }

        self.changes.push(GroupChange::new(
            &current.id,
            Some(current.clone()),
            Some(next.clone()),
        ));
        Ok(next)
    }

    pub async fn delete_group(&mut self, current: &Group) -> DatabaseResult<()> {
        let result = sqlx::query("DELETE FROM groups WHERE id = ? AND version = ?")
            .bind(&current.id)
            .bind(current.version)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::conflict(format!(
                "group {} changed after version {}",
                current.id, current.version
            )));
        }

        self.changes
            .push(GroupChange::new(&current.id, Some(current.clone()), None));
        Ok(())
    }

    pub async fn read_chatroom(&mut self, id: &str) -> DatabaseResult<Option<Chatroom>> {
        let row = sqlx::query(
            "SELECT id, participants, group_ids, created_at FROM chatrooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(Chatroom::from_row).transpose()
    }

    /// Insert a chatroom; a concurrent insert of the same id surfaces as a conflict.
    pub async fn insert_chatroom(&mut self, chatroom: &Chatroom) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO chatrooms (id, participants, group_ids, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&chatroom.id)
        .bind(serde_json::to_string(&chatroom.participants)?)
        .bind(serde_json::to_string(&chatroom.group_ids)?)
        .bind(&chatroom.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn read_user(&mut self, id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, nickname, current_group_id, version, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(User::from_row).transpose()
    }

    /// Point `current`'s current-chat pointer at `target`.
    pub async fn set_current_group(&mut self, current: &User, target: &str) -> DatabaseResult<User> {
        let next = User {
            current_group_id: Some(target.to_string()),
            version: current.version + 1,
            updated_at: Utc::now().to_rfc3339(),
            ..current.clone()
        };

        let result = sqlx::query(
            "UPDATE users SET current_group_id = ?, version = ?, updated_at = ? WHERE id = ? AND version = ?",
        )
        .bind(&next.current_group_id)
        .bind(next.version)
        .bind(&next.updated_at)
        .bind(&current.id)
        .bind(current.version)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::conflict(format!(
                "user {} changed after version {}",
                current.id, current.version
            )));
        }
        Ok(next)
    }

    /// Commit and publish every staged group change.
    pub async fn commit(self) -> DatabaseResult<Vec<GroupChange>> {
        let Self { tx, feed, changes } = self;
        tx.commit().await?;

        debug!(changes = changes.len(), "store transaction committed");
        for change in &changes {
            feed.publish(change.clone());
        }
        Ok(changes)
    }

    pub async fn rollback(self) -> DatabaseResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
