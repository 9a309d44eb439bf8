use tracing::error;

use crate::{AppError, AppState};
use backend_domain::RecordId;

pub async fn soft_delete_record(state: &AppState, id: i64) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::BadRequest("record id must be positive".to_string()));
    }
    let deleted = state
        .attendance_repo
        .soft_delete(RecordId(id))
        .await
        .map_err(|err| {
            error!("failed to soft delete record {}: {}", id, err);
            AppError::Internal(err)
        })?;
    if !deleted {
        return Err(AppError::NotFound(format!("attendance record {}", id)));
    }
    Ok(())
}
