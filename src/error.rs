use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::InternalServerError => "Internal server error",
            AppError::InvalidArgument(_) => "Validation failed",
            AppError::NotFound(_) => "Not found",
            AppError::Conflict(_) => "Conflict",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidArgument(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Duplicate relations are a client error, not a distinct 409.
        let status = match &self {
            AppError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidArgument(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        match &self {
            AppError::InternalServerError => {}
            AppError::NotFound(msg) => tracing::warn!("Not found: {}", msg),
            AppError::InvalidArgument(msg) | AppError::Conflict(msg) => {
                tracing::warn!("Rejected request: {}", msg)
            }
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Path ids are positive integers; anything else is rejected before touching the store.
pub fn ensure_positive_id(id: i64, what: &str) -> Result<i64> {
    if id <= 0 {
        return Err(AppError::invalid(format!("{} id must be positive, got {}", what, id)));
    }
    Ok(id)
}
