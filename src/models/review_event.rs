//! Append-only record of one submitted rating.
use super::{Quality, ReviewState};
use serde::{Deserialize, Serialize};

pub type CardId = i64;
pub type DeckId = i64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    pub card_id: CardId,
    pub user_id: String,
    pub quality: Quality,
    #[serde(flatten)]
    pub state: ReviewState,
}
