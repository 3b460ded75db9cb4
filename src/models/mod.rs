pub mod clock;
pub mod review_event;
pub mod review_state;
pub mod sm2;
pub mod stats;
pub mod study_item;

pub use clock::{Clock, FixedClock, SystemClock};
pub use review_event::{CardId, DeckId, ReviewEvent};
pub use review_state::ReviewState;
pub use sm2::{Quality, SchedulingParams, compute_next_review, is_due, schedule};
pub use stats::{CardStatus, DueLimit, ReviewStats, ReviewSummary, summarize};
pub use study_item::StudyItem;
