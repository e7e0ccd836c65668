pub mod dates;
pub mod models;
pub mod review;

// Re-exports
pub use models::*;

use axum::{extract::State, routing::get, Json, Router};

pub const LANDING_MESSAGE: &str = "Landing page for dates-in-sg project";

pub async fn landing_handler() -> &'static str {
    LANDING_MESSAGE
}

pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, AppError> {
    state
        .store
        .ping()
        .await
        .map_err(|e| AppError::Unavailable(format!("store unreachable: {}", e)))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.store.backend().to_string(),
    }))
}

/// Every route the service answers, bound to `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing_handler))
        .route("/health", get(health_handler))
        .merge(dates::routes())
        .merge(review::routes())
        .with_state(state)
}
