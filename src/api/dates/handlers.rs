use crate::api::models::*;
use crate::storage::{model::mergeable_fields, DateEntry, Fields, NewDateEntry};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

pub async fn list_dates_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<DateEntry>>, AppError> {
    let entries = state.store.list().await?;
    info!(count = entries.len(), "Listed date entries");
    Ok(Json(entries))
}

/// Responds with `null` when no entry has the id
pub async fn get_date_handler(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Option<DateEntry>>, AppError> {
    let id = query.date_id()?;
    Ok(Json(state.store.get(&id).await?))
}

pub async fn add_date_handler(
    State(state): State<AppState>,
    Json(body): Json<Fields>,
) -> Result<(StatusCode, String), AppError> {
    let entry = NewDateEntry::from_fields(body).ok_or(AppError::Rejected)?;
    let id = state.store.insert(entry).await?;

    info!(oid = %id, "Date entry added");
    Ok((
        StatusCode::CREATED,
        format!("_id of inserted document: {}", id),
    ))
}

pub async fn update_date_handler(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
    Json(body): Json<Fields>,
) -> Result<String, AppError> {
    let id = query.date_id()?;
    let updates = mergeable_fields(body);

    let modified = if updates.is_empty() {
        0
    } else {
        state.store.update(&id, updates).await?
    };

    info!(oid = %id, modified, "Date entry updated");
    Ok(format!("Documents updated: {}", modified))
}

pub async fn delete_date_handler(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> Result<String, AppError> {
    let id = query.date_id()?;
    let deleted = state.store.delete(&id).await?;

    info!(oid = %id, deleted, "Date entry deleted");
    Ok(format!("Documents deleted: {}", deleted))
}
