//! Business logic services for matching

pub mod candidate_selector;
pub mod coordinator;
pub mod finalization_service;
pub mod notification_service;
pub mod pairing_service;

pub use candidate_selector::CandidateSelector;
pub use coordinator::{MatchCoordinator, SweepReport};
pub use finalization_service::FinalizationService;
pub use notification_service::{
    dispatch_match_completed, DeliveryReport, LoggingNotifier, MatchCompleted, MatchNotifier,
};
pub use pairing_service::PairingService;
