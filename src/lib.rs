pub mod database;
pub mod error;
pub mod export;
pub mod models;

pub use error::{ReviewError, StoreError};
pub use models::{
    ReviewEvent, ReviewState, ReviewStats, ReviewSummary, StudyItem, compute_next_review, is_due,
    summarize,
};
