use crate::api::models::AppState;
use crate::api::review::handlers::*;
use axum::{
    routing::{delete, put},
    Router,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/add-review", put(add_review_handler))
        .route("/update-review", put(update_review_handler))
        .route("/delete-review", delete(delete_review_handler))
}
