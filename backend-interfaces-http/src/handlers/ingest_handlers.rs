use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use backend_application::commands::ingest_commands;
use backend_application::AppState;
use backend_domain::{DeviceId, IngestSummary};

use crate::error::HttpError;
use crate::middleware::authorize;

/// Manual trigger. Same path the poll scheduler takes, failures are returned to the caller.
pub async fn ingest_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
) -> Result<Json<IngestSummary>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    if device_id <= 0 {
        return Err(HttpError::BadRequest(format!("invalid device id {}", device_id)));
    }
    let summary = ingest_commands::ingest_for_device(&state, DeviceId(device_id)).await?;
    Ok(Json(summary))
}
