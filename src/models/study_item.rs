//! A card as seen by the review core: its ids and latest scheduling state.
use super::{CardId, DeckId, ReviewState};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyItem {
    pub card_id: CardId,
    pub deck_id: DeckId,
    /// `None` when the card has never been reviewed by this user.
    pub latest: Option<ReviewState>,
}

impl StudyItem {
    pub fn new(card_id: CardId, deck_id: DeckId) -> Self {
        Self {
            card_id,
            deck_id,
            latest: None,
        }
    }

    pub fn with_state(card_id: CardId, deck_id: DeckId, state: ReviewState) -> Self {
        Self {
            card_id,
            deck_id,
            latest: Some(state),
        }
    }
}
