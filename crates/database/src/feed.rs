//! In-process change feed for group documents.
//!
//! Every committed write to a group publishes one [`GroupChange`] carrying
//! the document before and after the write. Delivery is at-most-once and
//! nothing is persisted; the status fields in the store stay authoritative.

use tokio::sync::broadcast;
use tracing::trace;

use crate::entities::{Group, GroupStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct GroupChange {
    pub group_id: String,
    /// `None` when the group was created by this write.
    pub before: Option<Group>,
    /// `None` when the group was deleted by this write.
    pub after: Option<Group>,
}

impl GroupChange {
    pub fn new(group_id: impl Into<String>, before: Option<Group>, after: Option<Group>) -> Self {
        Self {
            group_id: group_id.into(),
            before,
            after,
        }
    }

    /// Replay of the current state, as produced by a sweep.
    pub fn replay(group: Group) -> Self {
        Self {
            group_id: group.id.clone(),
            before: Some(group.clone()),
            after: Some(group),
        }
    }

    pub fn status_before(&self) -> Option<GroupStatus> {
        self.before.as_ref().map(|g| g.status)
    }

    pub fn status_after(&self) -> Option<GroupStatus> {
        self.after.as_ref().map(|g| g.status)
    }

    /// True when this write moved the group into `status`.
    pub fn entered(&self, status: GroupStatus) -> bool {
        self.status_after() == Some(status) && self.status_before() != Some(status)
    }

    pub fn is_deletion(&self) -> bool {
        self.after.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<GroupChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GroupChange> {
        self.sender.subscribe()
    }

    /// Publish a change; returns the number of receivers that saw it.
    pub fn publish(&self, change: GroupChange) -> usize {
        let group_id = change.group_id.clone();
        match self.sender.send(change) {
            Ok(receivers) => {
                trace!(group_id = %group_id, receivers, "published group change");
                receivers
            }
            Err(_) => {
                trace!(group_id = %group_id, "no subscribers for group change");
                0
            }
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(1_024)
    }
}
