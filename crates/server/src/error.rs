use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use portfolio_pulse_core::errors::CoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Core(e) => match e {
                CoreError::NoPosition { .. } | CoreError::InsufficientQuantity { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                e if e.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        if status.is_client_error() {
            debug!(error = %self, "request rejected");
        } else {
            error!(error = %self, "request failed");
        }

        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
