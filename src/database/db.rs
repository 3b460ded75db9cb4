//! Database operations for the review store
//!
//! Handles SQLite database initialization, the decks and cards that own review
//! history, the append-only review log and the simulated current date.
//! Scheduling and aggregation are delegated to `models::sm2` and `models::stats`.

use crate::error::{Result, ReviewError, StoreError};
use crate::models::stats::{self, DueLimit};
use crate::models::{
    CardId, Clock, DeckId, Quality, ReviewEvent, ReviewState, ReviewStats, SchedulingParams,
    StudyItem, schedule,
};
use chrono::{DateTime, Days, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info, warn};

/// Due-queue size used when the caller does not ask for one.
pub const DEFAULT_DUE_LIMIT: i64 = 20;
/// Largest due queue a caller may request.
pub const MAX_DUE_LIMIT: i64 = 100;

/// Opens (or creates) the database file and initializes its tables.
///
/// The simulated current date is seeded from `clock` if not already stored.
pub fn init_database(path: impl AsRef<Path>, clock: &dyn Clock) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())?;
    create_schema(&conn, clock)?;
    info!(path = %path.as_ref().display(), "Review store opened");
    Ok(conn)
}

/// Initializes a throwaway in-memory database.
pub fn init_in_memory(clock: &dyn Clock) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn, clock)?;
    Ok(conn)
}

fn create_schema(conn: &Connection, clock: &dyn Clock) -> Result<()> {
    // Review history goes away with its card
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        (),
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deck_id INTEGER NOT NULL,
            front TEXT NOT NULL,
            back TEXT NOT NULL,
            FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
        )",
        (),
    )?;

    // Append-only: rows are inserted by submit_review and never updated
    conn.execute(
        "CREATE TABLE IF NOT EXISTS card_reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER NOT NULL,
            user_id TEXT NOT NULL,
            quality INTEGER NOT NULL,
            easiness_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL DEFAULT 0,
            repetitions INTEGER NOT NULL DEFAULT 0,
            next_review INTEGER NOT NULL,
            last_reviewed INTEGER NOT NULL,
            FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
        )",
        (),
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_card_reviews_latest
         ON card_reviews (card_id, user_id, last_reviewed DESC)",
        (),
    )?;

    // Create app_state table for storing current date
    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        (),
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![clock.now().timestamp().to_string()],
    )?;

    Ok(())
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::InvalidTimestamp(secs.to_string()))
}

/// Retrieves the simulated current date
pub fn get_current_date(conn: &Connection) -> Result<DateTime<Utc>> {
    let value: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'current_date'",
        [],
        |row| row.get(0),
    )?;

    let secs = value
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidTimestamp(value.clone()))?;
    from_timestamp(secs)
}

pub fn set_current_date(date: DateTime<Utc>, conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![date.timestamp().to_string()],
    )?;
    Ok(())
}

/// Advances the simulated date by one calendar day and returns the new date
pub fn advance_day(conn: &Connection) -> Result<DateTime<Utc>> {
    let current = get_current_date(conn)?;
    let next_day = current
        .checked_add_days(Days::new(1))
        .ok_or_else(|| StoreError::InvalidTimestamp(current.to_rfc3339()))?;
    set_current_date(next_day, conn)?;
    info!(date = %next_day, "Advanced simulated date");
    Ok(next_day)
}

/// Creates a new deck owned by `user_id`
pub fn new_deck(user_id: &str, name: &str, conn: &Connection) -> Result<DeckId> {
    conn.execute(
        "INSERT INTO decks (user_id, name) VALUES (?1, ?2)",
        params![user_id, name],
    )?;
    let deck_id = conn.last_insert_rowid();
    info!(deck_id, user_id, name, "Deck created");
    Ok(deck_id)
}

/// Adds a card to one of the user's decks. The card starts with no review history.
pub fn add_card(
    deck_id: DeckId,
    user_id: &str,
    front: &str,
    back: &str,
    conn: &Connection,
) -> Result<CardId> {
    let owned = conn
        .query_row(
            "SELECT 1 FROM decks WHERE id = ?1 AND user_id = ?2",
            params![deck_id, user_id],
            |_| Ok(()),
        )
        .optional()?;
    owned.ok_or_else(|| StoreError::NotFound(format!("deck {deck_id}")))?;

    conn.execute(
        "INSERT INTO cards (deck_id, front, back) VALUES (?1, ?2, ?3)",
        params![deck_id, front, back],
    )?;
    let card_id = conn.last_insert_rowid();
    debug!(card_id, deck_id, "Card added");
    Ok(card_id)
}

/// Deletes a card together with its review history
pub fn delete_card(card_id: CardId, user_id: &str, conn: &Connection) -> Result<()> {
    ensure_card_owned(card_id, user_id, conn)?;
    conn.execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
    info!(card_id, user_id, "Card deleted");
    Ok(())
}

fn ensure_card_owned(card_id: CardId, user_id: &str, conn: &Connection) -> Result<()> {
    let owned = conn
        .query_row(
            "SELECT 1 FROM cards c JOIN decks d ON c.deck_id = d.id
             WHERE c.id = ?1 AND d.user_id = ?2",
            params![card_id, user_id],
            |_| Ok(()),
        )
        .optional()?;

    owned.ok_or_else(|| StoreError::NotFound(format!("card {card_id}")))
}

/// Raw `card_reviews` columns; timestamps are converted after the query.
struct ReviewRow {
    card_id: CardId,
    user_id: String,
    quality: i32,
    easiness_factor: f64,
    interval_days: u32,
    repetitions: u32,
    next_review: i64,
    last_reviewed: i64,
}

const REVIEW_COLUMNS: &str = "card_id, user_id, quality, easiness_factor, interval_days, \
                              repetitions, next_review, last_reviewed";

impl ReviewRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            card_id: row.get(0)?,
            user_id: row.get(1)?,
            quality: row.get(2)?,
            easiness_factor: row.get(3)?,
            interval_days: row.get(4)?,
            repetitions: row.get(5)?,
            next_review: row.get(6)?,
            last_reviewed: row.get(7)?,
        })
    }

    fn build_state(
        easiness_factor: f64,
        interval_days: u32,
        repetitions: u32,
        next_review: i64,
        last_reviewed: i64,
    ) -> Result<ReviewState> {
        Ok(ReviewState {
            easiness_factor,
            interval_days,
            repetitions,
            next_review: from_timestamp(next_review)?,
            last_reviewed: from_timestamp(last_reviewed)?,
        })
    }

    fn into_event(self) -> Result<ReviewEvent> {
        Ok(ReviewEvent {
            card_id: self.card_id,
            user_id: self.user_id,
            quality: Quality::new(self.quality)?,
            state: Self::build_state(
                self.easiness_factor,
                self.interval_days,
                self.repetitions,
                self.next_review,
                self.last_reviewed,
            )?,
        })
    }
}

/// Most recent review of a card by a user, if any
pub fn get_latest_review(
    card_id: CardId,
    user_id: &str,
    conn: &Connection,
) -> Result<Option<ReviewEvent>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {REVIEW_COLUMNS} FROM card_reviews
                 WHERE card_id = ?1 AND user_id = ?2
                 ORDER BY last_reviewed DESC, id DESC
                 LIMIT 1"
            ),
            params![card_id, user_id],
            ReviewRow::from_row,
        )
        .optional()?;

    row.map(ReviewRow::into_event).transpose()
}

/// Full review history of a card, newest first
pub fn get_review_history(
    card_id: CardId,
    user_id: &str,
    conn: &Connection,
) -> Result<Vec<ReviewEvent>> {
    ensure_card_owned(card_id, user_id, conn)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM card_reviews
         WHERE card_id = ?1 AND user_id = ?2
         ORDER BY last_reviewed DESC, id DESC"
    ))?;

    let rows = stmt
        .query_map(params![card_id, user_id], ReviewRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(ReviewRow::into_event).collect()
}

/// Rates a card: computes the next SM-2 state from the latest review and
/// appends it as a new review event.
///
/// `now` is truncated to whole seconds, the precision the log is stored at.
pub fn submit_review(
    card_id: CardId,
    user_id: &str,
    quality: i32,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<ReviewEvent> {
    ensure_card_owned(card_id, user_id, conn)?;

    let latest = get_latest_review(card_id, user_id, conn)?;
    let prior = latest.as_ref().map(|event| SchedulingParams::from(&event.state));

    let rating = Quality::new(quality).inspect_err(|e| {
        warn!(card_id, quality, error = %e, "Review rejected");
    })?;
    let state = schedule(rating, prior.as_ref(), now.trunc_subsecs(0))?;

    let event = ReviewEvent {
        card_id,
        user_id: user_id.to_string(),
        quality: rating,
        state,
    };

    conn.execute(
        "INSERT INTO card_reviews
         (card_id, user_id, quality, easiness_factor, interval_days, repetitions, next_review, last_reviewed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.card_id,
            event.user_id,
            event.quality.value(),
            event.state.easiness_factor,
            event.state.interval_days,
            event.state.repetitions,
            event.state.next_review.timestamp(),
            event.state.last_reviewed.timestamp(),
        ],
    )?;

    info!(
        card_id,
        user_id,
        quality,
        interval_days = event.state.interval_days,
        repetitions = event.state.repetitions,
        "Review recorded"
    );

    Ok(event)
}

/// Every card in the user's decks (optionally one deck) with its latest review state
pub fn load_study_items(
    user_id: &str,
    deck_id: Option<DeckId>,
    conn: &Connection,
) -> Result<Vec<StudyItem>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.deck_id,
                r.easiness_factor, r.interval_days, r.repetitions, r.next_review, r.last_reviewed
         FROM cards c
         JOIN decks d ON c.deck_id = d.id
         LEFT JOIN card_reviews r ON r.id = (
             SELECT id FROM card_reviews
             WHERE card_id = c.id AND user_id = ?1
             ORDER BY last_reviewed DESC, id DESC
             LIMIT 1
         )
         WHERE d.user_id = ?1 AND (?2 IS NULL OR c.deck_id = ?2)
         ORDER BY c.id",
    )?;

    type ItemRow = (CardId, DeckId, Option<(f64, u32, u32, i64, i64)>);

    let rows = stmt
        .query_map(params![user_id, deck_id], |row| -> rusqlite::Result<ItemRow> {
            let ef: Option<f64> = row.get(2)?;
            let latest: Option<(f64, u32, u32, i64, i64)> = match ef {
                Some(ef) => Some((ef, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?)),
                None => None,
            };
            Ok((row.get(0)?, row.get(1)?, latest))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let items = rows
        .into_iter()
        .map(|(card_id, deck_id, latest)| -> Result<StudyItem> {
            let latest = latest
                .map(|(ef, interval, reps, next, last)| {
                    ReviewRow::build_state(ef, interval, reps, next, last)
                })
                .transpose()?;
            Ok(StudyItem {
                card_id,
                deck_id,
                latest,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(user_id, ?deck_id, count = items.len(), "Loaded study items");
    Ok(items)
}

/// Validates a requested due-queue size against the service bounds
pub fn due_limit(limit: Option<i64>) -> Result<DueLimit> {
    let limit = limit.unwrap_or(DEFAULT_DUE_LIMIT);
    if limit > MAX_DUE_LIMIT {
        return Err(ReviewError::InvalidLimit(limit).into());
    }
    Ok(DueLimit::new(limit)?)
}

/// Cards due for review, never-reviewed first, then earliest due
pub fn get_due_cards(
    user_id: &str,
    deck_id: Option<DeckId>,
    limit: Option<i64>,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<Vec<StudyItem>> {
    let limit = due_limit(limit)?;
    let items = load_study_items(user_id, deck_id, conn)?;
    Ok(stats::due_queue(&items, now, deck_id, Some(limit)))
}

pub fn get_stats(
    user_id: &str,
    deck_id: Option<DeckId>,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<ReviewStats> {
    let items = load_study_items(user_id, deck_id, conn)?;
    Ok(stats::compute_stats(&items, now, deck_id))
}
