//! Outcome types shared by the matching services.

pub mod errors;

pub use errors::{MatchError, MatchResult};

use groupting_database::{Chatroom, Group};

/// Both groups as committed by a successful pairing transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub group: Group,
    pub peer: Group,
}

/// What a seeking trigger ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum SeekOutcome {
    Matched(MatchedPair),
    /// No other group of the same size is seeking right now.
    NoCandidate,
    /// The group was claimed, withdrawn or deleted by someone else.
    NoLongerSeeking,
    /// Retries or candidates ran out; the group stays seeking for the next trigger.
    GaveUp { reason: String },
}

/// Pre-deletion snapshots of both groups and the chatroom that replaced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalized {
    pub chatroom: Chatroom,
    pub group: Group,
    pub peer: Group,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// The peer is the elected finalizer.
    Deferred { finalizer: String },
    /// The chatroom already exists; nothing was written.
    AlreadyFinalized { chatroom_id: String },
    Created(Finalized),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Ignored,
    Seek(SeekOutcome),
    Finalize(FinalizeOutcome),
}
