//! Rating aggregation.
//!
//! The aggregate average is derived state: it must be recomputed from
//! the full rating list on every mutation and persisted in the same
//! write. These functions are pure so the repository can run them
//! inside its compare-and-swap loop.

use crate::{error::AppError, model::UserRating};

/// Scores are half-point steps on a 0..=10 scale.
pub fn validate_score(score: f64) -> Result<(), AppError> {
    let doubled = score * 2.0;

    if !(0.0..=10.0).contains(&score) || doubled.fract() != 0.0 {
        return Err(AppError::InvalidRating);
    }

    Ok(())
}

/// Inserts or overwrites the caller's rating, matching by identity
/// only. Display names are not a key: two users may share one.
///
/// On overwrite only score and comment change; the watched snapshot and
/// display name keep their original values. On insert, `item_watched`
/// is captured as the snapshot.
pub fn upsert(
    ratings: &mut Vec<UserRating>,
    identity: &str,
    display_name: &str,
    score: f64,
    item_watched: bool,
    comment: Option<String>,
) {
    match ratings.iter_mut().find(|r| r.identity == identity) {
        Some(existing) => {
            existing.score = score;
            existing.comment = comment;
        }
        None => ratings.push(UserRating {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            score,
            watched: item_watched,
            comment,
        }),
    }
}

/// Drops the caller's rating, if any. Returns whether an entry was
/// removed.
pub fn remove(ratings: &mut Vec<UserRating>, identity: &str) -> bool {
    let before = ratings.len();
    ratings.retain(|r| r.identity != identity);
    ratings.len() != before
}

/// Arithmetic mean over all scores, rounded half-up to one decimal.
/// `0.0` for an empty list.
pub fn average(ratings: &[UserRating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }

    let sum: f64 = ratings.iter().map(|r| r.score).sum();
    let mean = sum / ratings.len() as f64;

    (mean * 10.0 + 0.5).floor() / 10.0
}
