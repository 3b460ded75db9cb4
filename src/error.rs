//! Error types for scheduling, aggregation and the review store.

/// Errors produced by the scheduler and the aggregator.
///
/// These are the only failures the pure review core can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewError {
    /// Quality rating outside the closed range 0..=5
    #[error("Quality must be between 0 and 5, got {0}")]
    InvalidRating(i32),
    /// Due-queue limit that is zero, negative or above a caller's maximum
    #[error("Invalid due-queue limit: {0}")]
    InvalidLimit(i64),
    /// Next review date cannot be represented
    #[error("Next review date is out of range")]
    DateOutOfRange,
}

/// Errors produced by the SQLite review store and JSON export.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Review(#[from] ReviewError),
    /// Card or deck missing, or not owned by the requesting user
    #[error("Not found: {0}")]
    NotFound(String),
    /// Imported review event that breaks a scheduling invariant
    #[error("Invalid review record: {0}")]
    InvalidRecord(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Store result type
pub type Result<T> = std::result::Result<T, StoreError>;
