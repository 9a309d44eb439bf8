use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use backend_application::commands::attendance_commands;
use backend_application::queries::attendance_queries;
use backend_application::AppState;
use backend_domain::{
    AttendanceEvent, AttendanceQuery, AttendanceStats, PagedResult, StatsQuery, StudentTimeline, StudentTimelineQuery,
};

use crate::error::HttpError;
use crate::middleware::authorize;

pub async fn list_attendance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<PagedResult<AttendanceEvent>>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let page = attendance_queries::list_attendance(&state, query).await?;
    Ok(Json(page))
}

pub async fn attendance_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AttendanceStats>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let stats = attendance_queries::attendance_stats(&state, query).await?;
    Ok(Json(stats))
}

pub async fn student_timeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(student_id): Path<i64>,
    Query(query): Query<StudentTimelineQuery>,
) -> Result<Json<StudentTimeline>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let timeline = attendance_queries::student_timeline(&state, student_id, query).await?;
    Ok(Json(timeline))
}

pub async fn delete_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    attendance_commands::soft_delete_record(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
