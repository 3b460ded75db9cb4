//! JSON import/export module for review history.
//! Provides functionality to save and load review events to/from JSON files.

use crate::error::{Result, StoreError};
use crate::models::ReviewEvent;
use crate::models::sm2::MIN_EASINESS_FACTOR;
use chrono::Days;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Exports review events to a pretty-printed JSON file at the specified path.
/// Returns an error if file creation or writing fails.
pub fn export_history_to_path(events: &[ReviewEvent], path: impl AsRef<Path>) -> Result<()> {
    let json_string = serde_json::to_string_pretty(events)?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(json_string.as_bytes())?;
    info!(count = events.len(), path = %path.as_ref().display(), "Review history exported");
    Ok(())
}

/// Checks the invariants a scheduled state must hold. Ratings are already
/// range-checked while deserializing.
fn validate_event(event: &ReviewEvent) -> Result<()> {
    let state = &event.state;
    if state.easiness_factor.is_nan() || state.easiness_factor < MIN_EASINESS_FACTOR {
        return Err(StoreError::InvalidRecord(format!(
            "card {}: easiness factor {} below {MIN_EASINESS_FACTOR}",
            event.card_id, state.easiness_factor
        )));
    }

    let expected = state
        .last_reviewed
        .checked_add_days(Days::new(u64::from(state.interval_days)));
    if expected != Some(state.next_review) {
        return Err(StoreError::InvalidRecord(format!(
            "card {}: next review is not {} days after last review",
            event.card_id, state.interval_days
        )));
    }

    Ok(())
}

/// Imports review events from a JSON file.
/// Returns an error if the file doesn't exist, contains invalid JSON, a rating
/// outside 0..=5 or a state that breaks the scheduling invariants.
pub fn import_history(path: impl AsRef<Path>) -> Result<Vec<ReviewEvent>> {
    let mut file = File::open(path.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let events: Vec<ReviewEvent> = serde_json::from_str(&contents)?;
    events.iter().try_for_each(validate_event)?;

    info!(count = events.len(), path = %path.as_ref().display(), "Review history imported");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quality, ReviewState};
    use chrono::{TimeZone, Utc};
    use std::fs;

    fn create_test_history() -> Vec<ReviewEvent> {
        let first = Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 2, 2, 18, 0, 0).unwrap();
        vec![
            ReviewEvent {
                card_id: 3,
                user_id: "alice".to_string(),
                quality: Quality::new(4).unwrap(),
                state: ReviewState {
                    easiness_factor: 2.5,
                    interval_days: 6,
                    repetitions: 2,
                    next_review: Utc.with_ymd_and_hms(2024, 2, 8, 18, 0, 0).unwrap(),
                    last_reviewed: second,
                },
            },
            ReviewEvent {
                card_id: 3,
                user_id: "alice".to_string(),
                quality: Quality::new(5).unwrap(),
                state: ReviewState {
                    easiness_factor: 2.6,
                    interval_days: 1,
                    repetitions: 1,
                    next_review: second,
                    last_reviewed: first,
                },
            },
        ]
    }

    #[test]
    fn test_export_history_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        export_history_to_path(&create_test_history(), &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"easinessFactor\": 2.6"));
        assert!(written.contains("\"nextReview\""));
    }

    #[test]
    fn test_import_history() {
        let json_content = r#"[
  {
    "cardId": 9,
    "userId": "bob",
    "quality": 2,
    "easinessFactor": 2.18,
    "intervalDays": 1,
    "repetitions": 0,
    "nextReview": "2024-04-02T07:15:00Z",
    "lastReviewed": "2024-04-01T07:15:00Z"
  }
]"#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.json");
        fs::write(&path, json_content).unwrap();

        let events = import_history(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].card_id, 9);
        assert_eq!(events[0].quality.value(), 2);
        assert_eq!(events[0].state.repetitions, 0);
        assert_eq!(
            events[0].state.next_review,
            Utc.with_ymd_and_hms(2024, 4, 2, 7, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_export_and_import_keeps_order() {
        let history = create_test_history();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.json");

        export_history_to_path(&history, &path).unwrap();
        let imported = import_history(&path).unwrap();

        assert_eq!(history, imported);
    }

    fn write_single_event(dir: &Path, quality: i64, easiness_factor: f64) -> std::path::PathBuf {
        let event = serde_json::json!([{
            "cardId": 1,
            "userId": "alice",
            "quality": quality,
            "easinessFactor": easiness_factor,
            "intervalDays": 1,
            "repetitions": 1,
            "nextReview": "2024-04-02T07:15:00Z",
            "lastReviewed": "2024-04-01T07:15:00Z"
        }]);
        let path = dir.join("history.json");
        fs::write(&path, event.to_string()).unwrap();
        path
    }

    #[test]
    fn test_import_rejects_out_of_range_rating() {
        let dir = tempfile::tempdir().unwrap();
        for quality in [9, 6, -1] {
            let path = write_single_event(dir.path(), quality, 2.5);
            assert!(matches!(import_history(&path), Err(StoreError::Json(_))));
        }

        let path = write_single_event(dir.path(), 5, 2.5);
        assert_eq!(import_history(&path).unwrap()[0].quality.value(), 5);
    }

    #[test]
    fn test_import_rejects_easiness_below_floor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_single_event(dir.path(), 3, 0.2);
        assert!(matches!(
            import_history(&path),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_import_rejects_inconsistent_next_review() {
        let mut history = create_test_history();
        history[0].state.interval_days = 3;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inconsistent.json");
        export_history_to_path(&history, &path).unwrap();

        assert!(matches!(
            import_history(&path),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_import_nonexistent_file() {
        let result = import_history("nonexistent_file_xyz123.json");
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_import_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ this is not valid json }").unwrap();

        let result = import_history(&path);
        assert!(matches!(result, Err(StoreError::Json(_))));
    }
}
