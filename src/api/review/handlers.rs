use crate::api::models::*;
use crate::rating;
use crate::storage::{Fields, PushOutcome, Review};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

pub async fn add_review_handler(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
    Json(body): Json<Fields>,
) -> Result<String, AppError> {
    let id = query.date_id()?;
    let review = Review::from_fields(body, None, Utc::now())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = review.user_id.clone().unwrap_or_default();

    let added = match state.store.push_review(&id, review).await? {
        PushOutcome::Added => 1,
        PushOutcome::EntryMissing => 0,
        PushOutcome::AlreadyReviewed => {
            warn!(oid = %id, user_id = %user_id, "Duplicate review rejected");
            return Err(AppError::AlreadyReviewed);
        }
    };

    if added > 0 {
        let rating = rating::recompute(state.store.as_ref(), &id).await?;
        info!(oid = %id, user_id = %user_id, rating, "Review added");
    }
    Ok(format!("Reviews added: {}", added))
}

pub async fn update_review_handler(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
    Json(body): Json<Fields>,
) -> Result<String, AppError> {
    let id = query.date_id()?;
    let user_id = query.user_id()?;
    let review = Review::from_fields(body, Some(user_id), Utc::now())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let modified = state.store.replace_review(&id, user_id, review).await?;
    let rating = rating::recompute(state.store.as_ref(), &id).await?;

    info!(oid = %id, user_id, modified, rating, "Review updated");
    Ok(format!("Reviews modified: {}", modified))
}

pub async fn delete_review_handler(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<String, AppError> {
    let id = query.date_id()?;
    let user_id = query.user_id()?;

    let deleted = state.store.pull_review(&id, user_id).await?;
    let rating = rating::recompute(state.store.as_ref(), &id).await?;

    info!(oid = %id, user_id, deleted, rating, "Review deleted");
    Ok(format!("Reviews deleted: {}", deleted))
}
