use crate::errors::AppError;
use crate::ledger::DAILY_BUDGET_MINUTES;
use crate::models::{
    ActivityDraft, ActivityPatch, CreatedResponse, DayKey, DayResponse, DaySummary,
    DeletedResponse, EditedResponse,
};
use crate::state::AppState;
use crate::summary::build_summary;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_day(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<DayResponse>, AppError> {
    let (user_id, date) = path_params(path)?;
    let key = day_key(user_id, date)?;
    let ledger = state.ledger.read_day(&key).await?;
    let remaining_minutes = ledger
        .as_ref()
        .map_or(DAILY_BUDGET_MINUTES, |ledger| ledger.remaining_minutes());

    Ok(Json(DayResponse {
        user_id: key.user_id,
        date: key.date,
        ledger,
        remaining_minutes,
    }))
}

pub async fn get_summary(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<DaySummary>, AppError> {
    let (user_id, date) = path_params(path)?;
    let key = day_key(user_id, date)?;
    let ledger = state.ledger.read_day(&key).await?;
    Ok(Json(build_summary(ledger.as_ref())))
}

pub async fn add_activity(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Result<Json<ActivityDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let (user_id, date) = path_params(path)?;
    let key = day_key(user_id, date)?;
    let Json(draft) = payload.map_err(|err| AppError::bad_request(err.body_text()))?;

    let (id, ledger) = state.ledger.add_activity(&key, &draft).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id, ledger })))
}

pub async fn edit_activity(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String)>, PathRejection>,
    payload: Result<Json<ActivityPatch>, JsonRejection>,
) -> Result<Json<EditedResponse>, AppError> {
    let (user_id, date, activity_id) = path_params(path)?;
    let key = day_key(user_id, date)?;
    let Json(patch) = payload.map_err(|err| AppError::bad_request(err.body_text()))?;

    let (activity, ledger) = state
        .ledger
        .edit_activity(&key, &activity_id, &patch)
        .await?;
    Ok(Json(EditedResponse { activity, ledger }))
}

pub async fn delete_activity(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String)>, PathRejection>,
) -> Result<Json<DeletedResponse>, AppError> {
    let (user_id, date, activity_id) = path_params(path)?;
    let key = day_key(user_id, date)?;
    let ledger = state.ledger.delete_activity(&key, &activity_id).await?;
    Ok(Json(DeletedResponse { ledger }))
}

fn path_params<T>(path: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    path.map(|Path(params)| params)
        .map_err(|err| AppError::bad_request(err.body_text()))
}

// The user id comes from the identity provider and the date from the date
// picker; both are opaque partition keys here.
fn day_key(user_id: String, date: String) -> Result<DayKey, AppError> {
    let user_id = user_id.trim();
    let date = date.trim();
    if user_id.is_empty() {
        return Err(AppError::bad_request("user id must not be empty"));
    }
    if date.is_empty() {
        return Err(AppError::bad_request("date must not be empty"));
    }
    Ok(DayKey::new(user_id, date))
}
