//! Atomic claim of two seeking groups.

use groupting_database::{Group, MatchStore, StoreTransaction};
use tracing::{info, warn};

use crate::types::{MatchError, MatchResult, MatchedPair};

/// Moves a (self, candidate) pair from seeking to matched in one transaction.
///
/// Both documents are re-read inside the transaction. Whichever of two
/// racing claims commits first wins; the other fails with
/// [`MatchError::GroupNotSeeking`] on its re-read, or with a
/// [`MatchError::TransactionConflict`] if it had already read the old state.
#[derive(Debug, Clone)]
pub struct PairingService {
    store: MatchStore,
}

impl PairingService {
    pub fn new(store: MatchStore) -> Self {
        Self { store }
    }

    pub async fn pair(&self, self_id: &str, candidate_id: &str) -> MatchResult<MatchedPair> {
        if self_id == candidate_id {
            return Err(MatchError::SelfMatch {
                id: self_id.to_string(),
            });
        }

        let mut tx = self.store.begin().await?;
        match claim(&mut tx, self_id, candidate_id).await {
            Ok(pair) => {
                tx.commit().await?;
                info!(
                    group_id = %pair.group.id,
                    matched_group_id = %pair.peer.id,
                    members = pair.group.member_count(),
                    "groups matched"
                );
                Ok(pair)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "pairing rollback failed");
                }
                Err(err)
            }
        }
    }
}

async fn claim(
    tx: &mut StoreTransaction,
    self_id: &str,
    candidate_id: &str,
) -> MatchResult<MatchedPair> {
    let group = tx
        .read_group(self_id)
        .await?
        .ok_or_else(|| MatchError::group_not_found(self_id))?;
    let candidate = tx
        .read_group(candidate_id)
        .await?
        .ok_or_else(|| MatchError::group_not_found(candidate_id))?;

    // Self first: if we were claimed meanwhile, the candidate is irrelevant.
    ensure_seeking(&group)?;
    ensure_seeking(&candidate)?;

    let group = tx.update_group(&group, group.matched_with(candidate_id)).await?;
    let peer = tx
        .update_group(&candidate, candidate.matched_with(self_id))
        .await?;

    Ok(MatchedPair { group, peer })
}

fn ensure_seeking(group: &Group) -> MatchResult<()> {
    if group.is_seeking() {
        Ok(())
    } else {
        Err(MatchError::group_not_seeking(&group.id, group.status))
    }
}
