//! Scheduling state produced by one SM-2 review.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable SM-2 state attached to a review event.
///
/// `next_review` is always `interval_days` calendar days after `last_reviewed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
    pub last_reviewed: DateTime<Utc>,
}
