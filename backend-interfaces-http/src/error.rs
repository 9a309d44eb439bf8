use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use backend_application::AppError;

#[derive(Debug)]
pub enum HttpError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl From<AppError> for HttpError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::Unauthorized => HttpError::Unauthorized,
            AppError::BadRequest(msg) => HttpError::BadRequest(msg),
            AppError::NotFound(what) => HttpError::NotFound(what),
            AppError::DeviceUnavailable(err) => HttpError::ServiceUnavailable(err.to_string()),
            AppError::Internal(err) => {
                error!("request failed: {:#}", err);
                HttpError::Internal(format!("{:#}", err))
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, format!("bad request: {}", msg)),
            HttpError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            HttpError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            HttpError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_domain::{DeviceId, DeviceUnavailable};

    #[test]
    fn device_failures_map_to_service_unavailable() {
        let err = HttpError::from(AppError::from(DeviceUnavailable::new(DeviceId(3), "timed out")));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn missing_records_map_to_not_found() {
        let err = HttpError::from(AppError::NotFound("record 9".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
