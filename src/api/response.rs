//! JSON envelopes shared by every endpoint.
//!
//! Success: `{ "success": true, "data": ... }`
//! Failure: `{ "success": false, "error": { "message": ..., "code": ... } }`

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Result type returned by handlers.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, Error>;

/// Wraps `data` in a success envelope.
#[allow(clippy::unnecessary_wraps)]
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

impl Error {
    /// HTTP status matching [`Error::code`].
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } | Self::InvalidAmount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidTransition { .. }
            | Self::BudgetExceeded { .. }
            | Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "success": false,
            "error": { "message": message, "code": self.code() },
        });
        (status, Json(body)).into_response()
    }
}
