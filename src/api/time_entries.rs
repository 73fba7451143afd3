//! Time entry API endpoints
//!
//! All routes act on the caller identified by the user header:
//! - POST /api/v1/time-entries/start - Start a timer
//! - PUT /api/v1/time-entries/stop/{id} - Stop a running timer
//! - GET /api/v1/time-entries/running - Current running timer or null
//! - POST /api/v1/time-entries/manual - Record a fixed-duration entry
//! - GET /api/v1/time-entries/timesheet - Per-project report for a date range
//! - GET /api/v1/time-entries - List entries
//! - GET|PUT|DELETE /api/v1/time-entries/{id} - Single entry

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{TimeEntryListResponse, TimeEntryResponse, TimesheetResponse};
use crate::models::{ManualEntryInput, StartTimerInput, TimeEntryFilter, UpdateTimeEntryInput};

/// Query parameters for the timesheet
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetQuery {
    #[serde(alias = "start_date")]
    pub start_date: NaiveDate,
    #[serde(alias = "end_date")]
    pub end_date: NaiveDate,
}

/// Query parameters for listing entries
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTimeEntriesQuery {
    #[serde(default, alias = "task_id")]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default, alias = "per_page")]
    pub per_page: Option<i64>,
}

impl From<ListTimeEntriesQuery> for TimeEntryFilter {
    fn from(query: ListTimeEntriesQuery) -> Self {
        let defaults = TimeEntryFilter::default();
        Self {
            task_id: query.task_id,
            from: query.from,
            to: query.to,
            page: query.page.unwrap_or(defaults.page),
            per_page: query.per_page.unwrap_or(defaults.per_page),
        }
    }
}

// Extractor rejections become the same JSON envelope as service errors

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| {
            ApiError::with_details(
                "VALIDATION_ERROR",
                "Invalid request body",
                serde_json::json!({ "reason": rejection.body_text() }),
            )
        })
}

fn entry_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::validation_error("Time entry id must be an integer"))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::validation_error(rejection.body_text()))
}

/// Build time entry router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_time_entries))
        .route("/start", post(start_timer))
        .route("/stop/{id}", put(stop_timer))
        .route("/running", get(get_running_timer))
        .route("/manual", post(create_manual_entry))
        .route("/timesheet", get(get_timesheet))
        .route(
            "/{id}",
            get(get_time_entry).put(update_time_entry).delete(delete_time_entry),
        )
}

/// POST /api/v1/time-entries/start
pub async fn start_timer(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    payload: Result<Json<StartTimerInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TimeEntryResponse>), ApiError> {
    let input = body(payload)?;
    let entry = state.timer_service.start(user_id, input).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// PUT /api/v1/time-entries/stop/{id}
pub async fn stop_timer(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TimeEntryResponse>, ApiError> {
    let id = entry_id(path)?;
    let entry = state.timer_service.stop(user_id, id).await?;
    Ok(Json(entry.into()))
}

/// GET /api/v1/time-entries/running
pub async fn get_running_timer(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Option<TimeEntryResponse>>, ApiError> {
    let entry = state.timer_service.get_running(user_id).await?;
    Ok(Json(entry.map(Into::into)))
}

/// POST /api/v1/time-entries/manual
pub async fn create_manual_entry(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    payload: Result<Json<ManualEntryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TimeEntryResponse>), ApiError> {
    let input = body(payload)?;
    let entry = state.timer_service.create_manual(user_id, input).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// GET /api/v1/time-entries/timesheet?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD
pub async fn get_timesheet(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    params: Result<Query<TimesheetQuery>, QueryRejection>,
) -> Result<Json<TimesheetResponse>, ApiError> {
    let params = query(params)?;
    let sheet = state
        .timesheet_service
        .build_timesheet(user_id, params.start_date, params.end_date)
        .await?;
    Ok(Json(sheet.into()))
}

/// GET /api/v1/time-entries
pub async fn list_time_entries(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    params: Result<Query<ListTimeEntriesQuery>, QueryRejection>,
) -> Result<Json<TimeEntryListResponse>, ApiError> {
    let filter: TimeEntryFilter = query(params)?.into();
    let entries = state.timer_service.list(user_id, &filter).await?;

    Ok(Json(TimeEntryListResponse {
        time_entries: entries.into_iter().map(Into::into).collect(),
        page: filter.page,
        per_page: filter.per_page,
    }))
}

/// GET /api/v1/time-entries/{id}
pub async fn get_time_entry(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TimeEntryResponse>, ApiError> {
    let id = entry_id(path)?;
    let entry = state.timer_service.get(user_id, id).await?;
    Ok(Json(entry.into()))
}

/// PUT /api/v1/time-entries/{id}
pub async fn update_time_entry(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateTimeEntryInput>, JsonRejection>,
) -> Result<Json<TimeEntryResponse>, ApiError> {
    let id = entry_id(path)?;
    let input = body(payload)?;
    let entry = state.timer_service.update(user_id, id, input).await?;
    Ok(Json(entry.into()))
}

/// DELETE /api/v1/time-entries/{id}
pub async fn delete_time_entry(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = entry_id(path)?;
    state.timer_service.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
