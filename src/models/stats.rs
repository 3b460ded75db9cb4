//! Review statistics and due queues derived from each card's latest review state.
//!
//! A card is `new` until its first review, `learning` while it has fewer than two
//! consecutive successes and `review` afterwards. Being due is counted separately:
//! a card can be both `learning` and due.

use super::sm2::is_due;
use super::{DeckId, ReviewState, StudyItem};
use crate::error::ReviewError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repetitions needed before a card leaves the learning phase.
pub const GRADUATING_REPETITIONS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    New,
    Learning,
    Review,
}

pub fn classify(latest: Option<&ReviewState>) -> CardStatus {
    match latest {
        None => CardStatus::New,
        Some(state) if state.repetitions < GRADUATING_REPETITIONS => CardStatus::Learning,
        Some(_) => CardStatus::Review,
    }
}

/// Never-reviewed cards are always due.
pub fn item_is_due(item: &StudyItem, now: DateTime<Utc>) -> bool {
    item.latest
        .as_ref()
        .is_none_or(|state| is_due(state.next_review, now))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub due: usize,
}

/// Maximum number of cards returned in a due queue. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueLimit(usize);

impl DueLimit {
    pub fn new(limit: i64) -> Result<Self, ReviewError> {
        match usize::try_from(limit) {
            Ok(n) if n > 0 => Ok(Self(n)),
            _ => Err(ReviewError::InvalidLimit(limit)),
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub stats: ReviewStats,
    pub due: Vec<StudyItem>,
}

fn in_deck(item: &StudyItem, deck_filter: Option<DeckId>) -> bool {
    deck_filter.is_none_or(|deck| item.deck_id == deck)
}

pub fn compute_stats(
    items: &[StudyItem],
    now: DateTime<Utc>,
    deck_filter: Option<DeckId>,
) -> ReviewStats {
    let mut stats = ReviewStats::default();

    for item in items.iter().filter(|item| in_deck(item, deck_filter)) {
        stats.total += 1;
        match classify(item.latest.as_ref()) {
            CardStatus::New => stats.new += 1,
            CardStatus::Learning => stats.learning += 1,
            CardStatus::Review => stats.review += 1,
        }
        if item_is_due(item, now) {
            stats.due += 1;
        }
    }

    stats
}

/// Due cards, never-reviewed first, then by next review time (earliest first).
/// Ties keep their input order. `limit` of `None` returns every due card.
pub fn due_queue(
    items: &[StudyItem],
    now: DateTime<Utc>,
    deck_filter: Option<DeckId>,
    limit: Option<DueLimit>,
) -> Vec<StudyItem> {
    let mut due: Vec<&StudyItem> = items
        .iter()
        .filter(|item| in_deck(item, deck_filter) && item_is_due(item, now))
        .collect();

    // None sorts before Some, and sort_by_key is stable
    due.sort_by_key(|item| item.latest.as_ref().map(|state| state.next_review));

    let take = limit.map_or(due.len(), DueLimit::get);
    due.into_iter().take(take).cloned().collect()
}

/// Stats and due queue in one pass over the same snapshot.
///
/// The limit is validated before anything else, so a non-positive limit fails
/// even for an empty collection.
pub fn summarize(
    items: &[StudyItem],
    now: DateTime<Utc>,
    deck_filter: Option<DeckId>,
    limit: Option<i64>,
) -> Result<ReviewSummary, ReviewError> {
    let limit = limit.map(DueLimit::new).transpose()?;

    Ok(ReviewSummary {
        stats: compute_stats(items, now, deck_filter),
        due: due_queue(items, now, deck_filter, limit),
    })
}
