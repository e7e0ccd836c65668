//! Keeps `review_rating` in step with an entry's reviews.
//!
//! Recomputation is a separate write issued right after the review
//! mutation; until it lands, readers may see the new reviews with the old
//! rating.

use crate::storage::{DateId, DateStore, StoreResult};
use tracing::debug;

/// Rating persisted for an entry with no numeric review ratings
pub const NO_RATING: f64 = 0.0;

/// Round a mean rating to one decimal place, or fall back to [`NO_RATING`]
pub fn settle(average: Option<f64>) -> f64 {
    match average {
        Some(avg) if avg.is_finite() => (avg * 10.0).round() / 10.0,
        _ => NO_RATING,
    }
}

/// Recompute and persist the rating of `id`, returning the stored value
pub async fn recompute(store: &dyn DateStore, id: &DateId) -> StoreResult<f64> {
    let rating = settle(store.average_rating(id).await?);
    store.set_review_rating(id, rating).await?;
    debug!(oid = %id, rating, "Recomputed review rating");
    Ok(rating)
}
