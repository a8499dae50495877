use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Score must be between 0 and 10 in steps of 0.5")]
    InvalidRating,

    #[error("{0}")]
    InvalidItem(String),

    #[error("Item not found")]
    NotFound,

    #[error("Invalid or missing authentication token")]
    Unauthorized,

    #[error("Caller does not own this item")]
    NotOwner,

    #[error("Metadata provider unavailable")]
    UpstreamUnavailable,

    #[error("Item was modified concurrently, try again")]
    WriteConflict,

    #[error("Database error: {0}")]
    Persistence(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidRating | AppError::InvalidItem { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotOwner => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable
            | AppError::WriteConflict
            | AppError::Persistence { .. }
            | AppError::Serialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
