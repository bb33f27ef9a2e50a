use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, patch, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/users/:user_id/days/:date", get(handlers::get_day))
        .route("/api/users/:user_id/days/:date/summary", get(handlers::get_summary))
        .route("/api/users/:user_id/days/:date/activities", post(handlers::add_activity))
        .route(
            "/api/users/:user_id/days/:date/activities/:activity_id",
            patch(handlers::edit_activity).delete(handlers::delete_activity),
        )
        .with_state(state)
}
