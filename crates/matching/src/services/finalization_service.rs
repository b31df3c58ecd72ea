//! Chatroom creation for a matched pair.
//!
//! Exactly one side of a pair finalizes: the one whose id sorts first. The
//! finalizer creates the chatroom, repoints every member's user document at
//! it and deletes both groups, all in one transaction. A redelivered trigger
//! finds the chatroom already present and writes nothing.

use std::collections::HashSet;

use groupting_database::{Chatroom, Group, MatchStore, StoreTransaction};
use tracing::{debug, info, warn};

use crate::types::{FinalizeOutcome, Finalized, MatchError, MatchResult};
use crate::utils::{canonical_pair_id, is_finalizer, ordered};

#[derive(Debug, Clone)]
pub struct FinalizationService {
    store: MatchStore,
}

impl FinalizationService {
    pub fn new(store: MatchStore) -> Self {
        Self { store }
    }

    pub async fn finalize(&self, self_id: &str, peer_id: &str) -> MatchResult<FinalizeOutcome> {
        if !is_finalizer(self_id, peer_id)? {
            debug!(group_id = %self_id, finalizer = %peer_id, "deferring finalization to peer");
            return Ok(FinalizeOutcome::Deferred {
                finalizer: peer_id.to_string(),
            });
        }

        let chatroom_id = canonical_pair_id(self_id, peer_id);
        let mut tx = self.store.begin().await?;

        let result = match tx.read_chatroom(&chatroom_id).await {
            Ok(Some(existing)) => ensure_same_pair(&existing, self_id, peer_id).map(|()| None),
            Ok(None) => create(&mut tx, self_id, peer_id, &chatroom_id).await.map(Some),
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(Some(finalized)) => {
                tx.commit().await?;
                info!(
                    chatroom_id = %finalized.chatroom.id,
                    group_id = %self_id,
                    matched_group_id = %peer_id,
                    participants = finalized.chatroom.participants.len(),
                    "chatroom created"
                );
                Ok(FinalizeOutcome::Created(finalized))
            }
            Ok(None) => {
                tx.rollback().await?;
                debug!(chatroom_id = %chatroom_id, "chatroom already exists");
                Ok(FinalizeOutcome::AlreadyFinalized { chatroom_id })
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "finalization rollback failed");
                }
                Err(err)
            }
        }
    }
}

async fn create(
    tx: &mut StoreTransaction,
    self_id: &str,
    peer_id: &str,
    chatroom_id: &str,
) -> MatchResult<Finalized> {
    let group = tx
        .read_group(self_id)
        .await?
        .ok_or_else(|| MatchError::group_missing(self_id))?;
    let peer = tx
        .read_group(peer_id)
        .await?
        .ok_or_else(|| MatchError::group_missing(peer_id))?;

    ensure_matched_with(&group, peer_id)?;
    ensure_matched_with(&peer, self_id)?;

    let participants = merge_members(&group, &peer);
    let (low, high) = ordered(self_id, peer_id);
    let chatroom = Chatroom::new(
        chatroom_id,
        participants,
        vec![low.to_string(), high.to_string()],
    );
    tx.insert_chatroom(&chatroom).await?;

    for user_id in &chatroom.participants {
        let user = tx
            .read_user(user_id)
            .await?
            .ok_or_else(|| MatchError::user_missing(user_id))?;
        tx.set_current_group(&user, chatroom_id).await?;
    }

    tx.delete_group(&group).await?;
    tx.delete_group(&peer).await?;

    Ok(Finalized {
        chatroom,
        group,
        peer,
    })
}

/// A chatroom found under this pair's id must have been created for this pair.
fn ensure_same_pair(existing: &Chatroom, self_id: &str, peer_id: &str) -> MatchResult<()> {
    let (low, high) = ordered(self_id, peer_id);
    if existing.group_ids == [low, high] {
        Ok(())
    } else {
        Err(MatchError::ChatroomMismatch {
            id: existing.id.clone(),
            expected: vec![low.to_string(), high.to_string()],
            found: existing.group_ids.clone(),
        })
    }
}

fn ensure_matched_with(group: &Group, peer_id: &str) -> MatchResult<()> {
    if group.is_matched() && group.matched_group_id.as_deref() == Some(peer_id) {
        Ok(())
    } else {
        Err(MatchError::peer_mismatch(&group.id, peer_id))
    }
}

/// Members of `first` then `second`, keeping the first occurrence of each id.
fn merge_members(first: &Group, second: &Group) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .member_ids
        .iter()
        .chain(second.member_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupting_database::CreateGroupRequest;

    fn group(id: &str, members: &[&str]) -> Group {
        Group::new(&CreateGroupRequest {
            id: Some(id.to_string()),
            name: Some(id.to_string()),
            member_ids: members.iter().map(|m| m.to_string()).collect(),
        })
    }

    #[test]
    fn test_merge_keeps_finalizer_members_first() {
        let merged = merge_members(&group("G1", &["a", "b"]), &group("G2", &["c", "d"]));
        assert_eq!(merged, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_merge_drops_shared_members() {
        let merged = merge_members(&group("G1", &["a", "b", "a"]), &group("G2", &["b", "c"]));
        assert_eq!(merged, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_existing_chatroom_must_belong_to_the_pair() {
        let room = Chatroom::new(
            "a_b_c",
            vec!["u1".to_string()],
            vec!["a_b".to_string(), "c".to_string()],
        );
        assert!(ensure_same_pair(&room, "a_b", "c").is_ok());
        assert!(ensure_same_pair(&room, "c", "a_b").is_ok());

        let err = ensure_same_pair(&room, "a", "b_c").unwrap_err();
        assert!(matches!(err, MatchError::ChatroomMismatch { .. }));
        assert!(err.is_integrity_fault());
    }

    #[test]
    fn test_unmatched_group_is_a_mismatch() {
        let seeking = group("G1", &["a"]);
        assert!(matches!(
            ensure_matched_with(&seeking, "G2"),
            Err(MatchError::PeerMismatch { .. })
        ));

        let matched = seeking.matched_with("G2");
        assert!(ensure_matched_with(&matched, "G2").is_ok());
        assert!(ensure_matched_with(&matched, "G3").is_err());
    }
}
