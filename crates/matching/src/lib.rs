//! Groupting Matching Crate
//!
//! Pairs seeking groups of equal size and turns each matched pair into a
//! shared chatroom. [`MatchCoordinator`] is the entry point: feed it the
//! store's change stream and it drives every group from seeking to a
//! chatroom, or leaves it seeking for the next trigger.

pub mod services;
pub mod types;
pub mod utils;

pub use services::{
    CandidateSelector, DeliveryReport, FinalizationService, LoggingNotifier, MatchCompleted,
    MatchCoordinator, MatchNotifier, PairingService, SweepReport,
};
pub use types::{
    FinalizeOutcome, Finalized, MatchError, MatchResult, MatchedPair, SeekOutcome, TriggerOutcome,
};
pub use utils::{canonical_pair_id, is_finalizer, RetryPolicy};
