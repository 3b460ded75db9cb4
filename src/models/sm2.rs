//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates optimal review intervals based on recall quality:
//! - Each card has an easiness factor (EF) that adjusts based on performance
//! - Quality grades 0-2: Reset interval to 1 day and repetitions to 0 (card needs relearning)
//! - Quality grades 3-5: Increase interval progressively (1 day → 6 days → EF multiplier)
//! - EF is adjusted after each review and has a minimum value of 1.3
//! - Higher quality responses lead to longer intervals between reviews
//!
//! Everything here is pure: the current time is always passed in.

use super::ReviewState;
use crate::error::ReviewError;
use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

/// EF assigned to a card that has never been reviewed.
pub const INITIAL_EASINESS_FACTOR: f64 = 2.5;
/// EF never falls below this value.
pub const MIN_EASINESS_FACTOR: f64 = 1.3;
/// Interval after the first success, and after any failure.
pub const FIRST_INTERVAL_DAYS: u32 = 1;
/// Interval after the second consecutive success.
pub const SECOND_INTERVAL_DAYS: u32 = 6;
/// Lowest quality that counts as a successful recall.
pub const PASSING_QUALITY: u8 = 3;
pub const MAX_QUALITY: u8 = 5;

/// A quality rating validated to 0..=5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "u8")]
pub struct Quality(u8);

impl Quality {
    /// Rejects (never clamps) ratings outside 0..=5.
    pub fn new(value: i32) -> Result<Self, ReviewError> {
        match u8::try_from(value) {
            Ok(q) if q <= MAX_QUALITY => Ok(Self(q)),
            _ => Err(ReviewError::InvalidRating(value)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= PASSING_QUALITY
    }

    pub fn description(self) -> &'static str {
        match self.0 {
            0 => "Complete blackout",
            1 => "Incorrect, but recognized",
            2 => "Incorrect, but seemed easy",
            3 => "Correct with difficulty",
            4 => "Correct with hesitation",
            _ => "Perfect recall",
        }
    }
}

impl TryFrom<i32> for Quality {
    type Error = ReviewError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// The part of a `ReviewState` that feeds the next calculation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulingParams {
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
}

impl Default for SchedulingParams {
    fn default() -> Self {
        Self {
            easiness_factor: INITIAL_EASINESS_FACTOR,
            interval_days: 0,
            repetitions: 0,
        }
    }
}

impl From<&ReviewState> for SchedulingParams {
    fn from(state: &ReviewState) -> Self {
        Self {
            easiness_factor: state.easiness_factor,
            interval_days: state.interval_days,
            repetitions: state.repetitions,
        }
    }
}

/// New E-Factor for a rating, floored at `MIN_EASINESS_FACTOR`.
pub fn next_easiness_factor(prior_ef: f64, quality: Quality) -> f64 {
    let penalty = f64::from(MAX_QUALITY - quality.value());
    let ef = prior_ef + (0.1 - penalty * (0.08 + penalty * 0.02));
    ef.max(MIN_EASINESS_FACTOR)
}

/// Calculates the state that follows `prior` after a review rated `quality` at `now`.
/// `prior` is `None` for a card that has never been reviewed.
pub fn compute_next_review(
    quality: i32,
    prior: Option<&SchedulingParams>,
    now: DateTime<Utc>,
) -> Result<ReviewState, ReviewError> {
    schedule(Quality::new(quality)?, prior, now)
}

/// Same as `compute_next_review` for a rating that is already validated.
pub fn schedule(
    quality: Quality,
    prior: Option<&SchedulingParams>,
    now: DateTime<Utc>,
) -> Result<ReviewState, ReviewError> {
    let prior = prior.copied().unwrap_or_default();

    let easiness_factor = next_easiness_factor(prior.easiness_factor, quality);

    let (interval_days, repetitions) = if !quality.is_passing() {
        // Failed recall restarts the ladder
        (FIRST_INTERVAL_DAYS, 0)
    } else {
        match prior.repetitions {
            0 => (FIRST_INTERVAL_DAYS, 1),
            1 => (SECOND_INTERVAL_DAYS, 2),
            reps => {
                let scaled = (f64::from(prior.interval_days) * easiness_factor).round();
                if scaled > f64::from(u32::MAX) {
                    return Err(ReviewError::DateOutOfRange);
                }
                // A zero prior interval can only come from inconsistent input.
                let interval = (scaled as u32).max(FIRST_INTERVAL_DAYS);
                (interval, reps.saturating_add(1))
            }
        }
    };

    let next_review = now
        .checked_add_days(Days::new(u64::from(interval_days)))
        .ok_or(ReviewError::DateOutOfRange)?;

    Ok(ReviewState {
        easiness_factor,
        interval_days,
        repetitions,
        next_review,
        last_reviewed: now,
    })
}

/// A scheduled card is due once `now` reaches its next review time.
pub fn is_due(next_review: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= next_review
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 14, 45, 30).unwrap()
    }

    fn params(easiness_factor: f64, interval_days: u32, repetitions: u32) -> SchedulingParams {
        SchedulingParams {
            easiness_factor,
            interval_days,
            repetitions,
        }
    }

    #[test]
    fn test_first_review() {
        let next = compute_next_review(5, None, now()).unwrap();
        assert!((next.easiness_factor - 2.6).abs() < 1e-9);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.next_review, now() + Duration::days(1));
        assert_eq!(next.last_reviewed, now());
    }

    #[test]
    fn test_default_params_match_no_history() {
        let explicit = compute_next_review(4, Some(&SchedulingParams::default()), now()).unwrap();
        let implicit = compute_next_review(4, None, now()).unwrap();
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn test_second_review() {
        let next = compute_next_review(4, Some(&params(2.5, 1, 1)), now()).unwrap();
        assert_eq!(next.interval_days, 6);
        assert_eq!(next.repetitions, 2);
        assert_eq!(next.next_review, now() + Duration::days(6));
    }

    #[test]
    fn test_subsequent_review_multiplies_by_new_ef() {
        let next = compute_next_review(3, Some(&params(2.5, 6, 2)), now()).unwrap();
        // 2.5 - 0.14
        assert!((next.easiness_factor - 2.36).abs() < 1e-9);
        assert_eq!(next.interval_days, (6.0_f64 * next.easiness_factor).round() as u32);
        assert_eq!(next.interval_days, 14);
        assert_eq!(next.repetitions, 3);
    }

    #[test]
    fn test_quality_below_3_resets() {
        for quality in 0..3 {
            let next = compute_next_review(quality, Some(&params(2.5, 30, 5)), now()).unwrap();
            assert_eq!(next.interval_days, 1);
            assert_eq!(next.repetitions, 0);
            assert!(next.easiness_factor < 2.5);
            assert_eq!(next.next_review, now() + Duration::days(1));
        }
    }

    #[test]
    fn test_ef_floor() {
        let next = compute_next_review(0, Some(&params(1.3, 1, 1)), now()).unwrap();
        assert_eq!(next.easiness_factor, MIN_EASINESS_FACTOR);

        let next = compute_next_review(2, Some(&params(1.4, 30, 5)), now()).unwrap();
        assert_eq!(next.easiness_factor, MIN_EASINESS_FACTOR);
    }

    #[test]
    fn test_ef_never_below_floor_for_any_valid_quality() {
        for quality in 0..=5 {
            for ef in [1.3, 1.5, 2.5, 3.1] {
                let next = compute_next_review(quality, Some(&params(ef, 10, 3)), now()).unwrap();
                assert!(next.easiness_factor >= MIN_EASINESS_FACTOR);
            }
        }
    }

    #[test]
    fn test_ef_has_no_ceiling() {
        let next = compute_next_review(5, Some(&params(4.0, 10, 3)), now()).unwrap();
        assert!((next.easiness_factor - 4.1).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_quality_rejected() {
        assert_eq!(
            compute_next_review(-1, None, now()),
            Err(ReviewError::InvalidRating(-1))
        );
        assert_eq!(
            compute_next_review(6, Some(&params(2.5, 6, 2)), now()),
            Err(ReviewError::InvalidRating(6))
        );
        assert!(Quality::new(256).is_err());
    }

    #[test]
    fn test_time_of_day_preserved() {
        let next = compute_next_review(4, Some(&params(2.5, 6, 2)), now()).unwrap();
        assert_eq!(next.next_review.time(), now().time());
        assert_eq!(
            next.next_review - next.last_reviewed,
            Duration::days(i64::from(next.interval_days))
        );
    }

    #[test]
    fn test_absurd_interval_is_out_of_range() {
        let result = compute_next_review(5, Some(&params(2.5, u32::MAX, 10)), now());
        assert_eq!(result, Err(ReviewError::DateOutOfRange));
    }

    #[test]
    fn test_schedule_with_validated_quality() {
        let prior = params(2.5, 6, 2);
        let rating = Quality::new(5).unwrap();
        assert_eq!(
            schedule(rating, Some(&prior), now()),
            compute_next_review(5, Some(&prior), now())
        );
    }

    #[test]
    fn test_quality_deserialization_rejects_out_of_range() {
        let rating: Quality = serde_json::from_str("3").unwrap();
        assert_eq!(rating.value(), 3);
        assert_eq!(serde_json::to_string(&rating).unwrap(), "3");
        assert!(serde_json::from_str::<Quality>("9").is_err());
        assert!(serde_json::from_str::<Quality>("-1").is_err());
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(now(), now()));
        assert!(is_due(now() - Duration::seconds(1), now()));
        assert!(!is_due(now() + Duration::seconds(1), now()));
    }

    #[test]
    fn test_quality_descriptions() {
        assert_eq!(Quality::new(0).unwrap().description(), "Complete blackout");
        assert_eq!(Quality::new(5).unwrap().description(), "Perfect recall");
        assert!(Quality::new(3).unwrap().is_passing());
        assert!(!Quality::new(2).unwrap().is_passing());
    }
}
