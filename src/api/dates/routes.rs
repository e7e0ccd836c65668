use crate::api::dates::handlers::*;
use crate::api::models::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/get-all", get(list_dates_handler))
        .route("/get-one", get(get_date_handler))
        .route("/add-date", post(add_date_handler))
        .route("/update-date", put(update_date_handler))
        .route("/delete-date", delete(delete_date_handler))
        // Name used by older clients
        .route("/remove-date", delete(delete_date_handler))
}
