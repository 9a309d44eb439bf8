use backend_domain::DeviceUnavailable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    DeviceUnavailable(#[from] DeviceUnavailable),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
