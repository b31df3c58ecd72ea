//! Trigger surface of the matching core.
//!
//! Every committed group write arrives here as a [`GroupChange`]. A group
//! that is seeking looks for a partner, and a matched group is driven to
//! finalization. Each change is handled as an independent task. The only
//! shared state is the store, so correctness rests on its transactions.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use groupting_config::MatchingConfig;
use groupting_database::{DatabaseError, GroupChange, GroupStatus, MatchStore};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::candidate_selector::CandidateSelector;
use super::finalization_service::FinalizationService;
use super::notification_service::{dispatch_match_completed, MatchNotifier};
use super::pairing_service::PairingService;
use crate::types::{FinalizeOutcome, MatchError, MatchResult, SeekOutcome, TriggerOutcome};
use crate::utils::RetryPolicy;

/// Counters for one pass over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub replayed: usize,
    pub paired: usize,
    pub finalized: usize,
    pub failed: usize,
}

pub struct MatchCoordinator {
    store: MatchStore,
    selector: CandidateSelector,
    pairing: PairingService,
    finalization: FinalizationService,
    notifier: Arc<dyn MatchNotifier>,
    retry: RetryPolicy,
    max_candidates: usize,
}

impl MatchCoordinator {
    pub fn new(store: MatchStore, config: &MatchingConfig, notifier: Arc<dyn MatchNotifier>) -> Self {
        Self {
            selector: CandidateSelector::new(store.groups()),
            pairing: PairingService::new(store.clone()),
            finalization: FinalizationService::new(store.clone()),
            store,
            notifier,
            retry: RetryPolicy::from_config(config),
            max_candidates: config.max_candidates_per_trigger.max(1) as usize,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    /// Try to pair `group_id` with another seeking group of the same size.
    ///
    /// A candidate that turns out to be claimed already is excluded and the
    /// search runs again. Running out of retries or candidates leaves the
    /// group seeking, to be picked up by the next trigger or sweep.
    pub async fn seek(&self, group_id: &str) -> MatchResult<SeekOutcome> {
        let groups = self.store.groups();
        let mut excluded = HashSet::new();

        for _ in 0..self.max_candidates {
            let group = match groups.find_by_id(group_id).await? {
                Some(group) if group.is_seeking() => group,
                _ => return Ok(SeekOutcome::NoLongerSeeking),
            };

            let Some(candidate) = self.selector.find_candidate(&group, &excluded).await? else {
                return Ok(SeekOutcome::NoCandidate);
            };

            let pairing = &self.pairing;
            let candidate_id = candidate.id.as_str();
            let attempt = self
                .retry
                .run("pairing", move || pairing.pair(group_id, candidate_id))
                .await;

            match attempt {
                Ok(pair) => return Ok(SeekOutcome::Matched(pair)),
                Err(MatchError::GroupNotSeeking { id, .. } | MatchError::GroupNotFound { id })
                    if id == candidate.id =>
                {
                    debug!(group_id = %group_id, candidate = %id, "candidate already claimed");
                    excluded.insert(id);
                }
                Err(err) if err.is_benign() => return Ok(SeekOutcome::NoLongerSeeking),
                Err(err) if err.is_retryable() => {
                    return Ok(SeekOutcome::GaveUp {
                        reason: err.to_string(),
                    })
                }
                Err(err) => return Err(err),
            }
        }

        Ok(SeekOutcome::GaveUp {
            reason: format!("{} candidates were claimed first", excluded.len()),
        })
    }

    /// Create the chatroom for a matched pair if this side is the finalizer,
    /// then notify the participants.
    pub async fn finalize(&self, group_id: &str, peer_id: &str) -> MatchResult<FinalizeOutcome> {
        let finalization = &self.finalization;
        let outcome = self
            .retry
            .run("finalization", move || finalization.finalize(group_id, peer_id))
            .await?;

        if let FinalizeOutcome::Created(finalized) = &outcome {
            dispatch_match_completed(&self.notifier, finalized).await;
        }
        Ok(outcome)
    }

    pub async fn handle_change(&self, change: &GroupChange) -> MatchResult<TriggerOutcome> {
        let Some(after) = change.after.as_ref() else {
            return Ok(TriggerOutcome::Ignored);
        };

        match after.status {
            GroupStatus::Seeking => self.seek(&change.group_id).await.map(TriggerOutcome::Seek),
            GroupStatus::Matched => {
                let peer_id = after.matched_group_id.as_deref().ok_or_else(|| {
                    DatabaseError::corrupt(&change.group_id, "matched without a peer")
                })?;
                self.finalize(&change.group_id, peer_id)
                    .await
                    .map(TriggerOutcome::Finalize)
            }
            GroupStatus::Idle => Ok(TriggerOutcome::Ignored),
        }
    }

    /// Handle one change and log the result. Never fails.
    pub async fn dispatch(&self, change: GroupChange) -> Option<TriggerOutcome> {
        let group_id = change.group_id.clone();
        match self.handle_change(&change).await {
            Ok(outcome) => {
                log_outcome(&group_id, &outcome);
                Some(outcome)
            }
            Err(err) if err.is_benign() => {
                debug!(group_id = %group_id, error = %err, "trigger already resolved elsewhere");
                None
            }
            Err(err) if err.is_retryable() => {
                warn!(group_id = %group_id, error = %err, "trigger abandoned, will retry on next delivery");
                None
            }
            Err(err) if err.is_integrity_fault() => {
                error!(group_id = %group_id, error = %err, "data integrity fault");
                None
            }
            Err(err) => {
                error!(group_id = %group_id, error = %err, "trigger failed");
                None
            }
        }
    }

    /// Replay the trigger for every matched group, then every seeking one.
    pub async fn sweep(&self) -> MatchResult<SweepReport> {
        let groups = self.store.groups();
        let mut report = SweepReport::default();

        for group in groups.find_by_status(GroupStatus::Matched).await? {
            report.replayed += 1;
            tally(&mut report, self.dispatch(GroupChange::replay(group)).await);
        }

        for group in groups.find_by_status(GroupStatus::Seeking).await? {
            report.replayed += 1;
            let outcome = self.dispatch(GroupChange::replay(group)).await;

            // Finish new pairs within the same pass.
            if let Some(TriggerOutcome::Seek(SeekOutcome::Matched(pair))) = &outcome {
                for side in [&pair.group, &pair.peer] {
                    let finalized = self.dispatch(GroupChange::replay(side.clone())).await;
                    tally(&mut report, finalized);
                }
            }
            tally(&mut report, outcome);
        }

        info!(
            replayed = report.replayed,
            paired = report.paired,
            finalized = report.finalized,
            failed = report.failed,
            "sweep finished"
        );
        Ok(report)
    }

    /// Consume the change feed until `shutdown` fires, one task per change.
    pub async fn run(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<GroupChange>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut tasks = JoinSet::new();
        info!("match coordinator started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = changes.recv() => match received {
                    Ok(change) => {
                        let coordinator = Arc::clone(&self);
                        tasks.spawn(async move {
                            coordinator.dispatch(change).await;
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change feed lagged, scheduling sweep");
                        let coordinator = Arc::clone(&self);
                        tasks.spawn(async move {
                            if let Err(err) = coordinator.sweep().await {
                                warn!(error = %err, "catch-up sweep failed");
                            }
                        });
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "trigger task panicked");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "trigger task panicked");
            }
        }
        info!("match coordinator stopped");
    }

    /// Sweep immediately and then every `interval` until `shutdown` fires.
    pub async fn run_sweeper(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        if interval.is_zero() {
            info!("periodic sweep disabled");
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep().await {
                        warn!(error = %err, "periodic sweep failed");
                    }
                }
            }
        }
    }
}

fn tally(report: &mut SweepReport, outcome: Option<TriggerOutcome>) {
    match outcome {
        Some(TriggerOutcome::Seek(SeekOutcome::Matched(_))) => report.paired += 1,
        Some(TriggerOutcome::Finalize(FinalizeOutcome::Created(_))) => report.finalized += 1,
        Some(_) => {}
        None => report.failed += 1,
    }
}

fn log_outcome(group_id: &str, outcome: &TriggerOutcome) {
    match outcome {
        TriggerOutcome::Ignored => {}
        TriggerOutcome::Seek(SeekOutcome::Matched(pair)) => {
            debug!(group_id = %group_id, matched_group_id = %pair.peer.id, "seek matched");
        }
        TriggerOutcome::Seek(SeekOutcome::NoCandidate) => {
            debug!(group_id = %group_id, "no candidate, staying in seeking");
        }
        TriggerOutcome::Seek(SeekOutcome::NoLongerSeeking) => {
            debug!(group_id = %group_id, "group left seeking before it was paired");
        }
        TriggerOutcome::Seek(SeekOutcome::GaveUp { reason }) => {
            warn!(group_id = %group_id, reason = %reason, "pairing gave up, staying in seeking");
        }
        TriggerOutcome::Finalize(FinalizeOutcome::Deferred { finalizer }) => {
            debug!(group_id = %group_id, finalizer = %finalizer, "finalization deferred");
        }
        TriggerOutcome::Finalize(FinalizeOutcome::AlreadyFinalized { chatroom_id }) => {
            debug!(group_id = %group_id, chatroom_id = %chatroom_id, "already finalized");
        }
        TriggerOutcome::Finalize(FinalizeOutcome::Created(finalized)) => {
            debug!(group_id = %group_id, chatroom_id = %finalized.chatroom.id, "finalized");
        }
    }
}
