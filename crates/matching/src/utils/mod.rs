//! Internal utilities for the matching core.

pub mod ids;
pub mod retry;

pub use ids::{canonical_pair_id, is_finalizer, ordered};
pub use retry::RetryPolicy;
