//! Candidate search for a group that just entered the seeking state.

use std::collections::HashSet;

use groupting_database::{Group, GroupRepository};
use tracing::debug;

use crate::types::MatchResult;

/// Narrows the search to one plausible partner.
///
/// The read is not transactional and may be stale by the time it returns;
/// the pairing transaction re-validates whatever is picked here.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    groups: GroupRepository,
}

impl CandidateSelector {
    pub fn new(groups: GroupRepository) -> Self {
        Self { groups }
    }

    /// First seeking group of the same size as `seeker`, skipping `excluded`.
    pub async fn find_candidate(
        &self,
        seeker: &Group,
        excluded: &HashSet<String>,
    ) -> MatchResult<Option<Group>> {
        let seeking = self.groups.find_seeking_except(&seeker.id).await?;
        let scanned = seeking.len();

        let candidate = seeking.into_iter().find(|group| {
            group.member_count() == seeker.member_count() && !excluded.contains(&group.id)
        });

        debug!(
            group_id = %seeker.id,
            members = seeker.member_count(),
            scanned,
            excluded = excluded.len(),
            candidate = candidate.as_ref().map(|g| g.id.as_str()),
            "candidate search finished"
        );
        Ok(candidate)
    }
}
