use std::collections::HashMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(HashMap<&'static str, String>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error")]
    Db(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<HashMap<&'static str, String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    message: "Please fill all required fields.".to_string(),
                    errors: Some(errors),
                },
            ),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorBody { message, errors: None }),
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, ErrorBody { message, errors: None }),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, ErrorBody { message, errors: None }),
            AppError::Conflict(message) => (StatusCode::CONFLICT, ErrorBody { message, errors: None }),
            AppError::Db(e) => {
                tracing::error!(error = ?e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: "A database error occurred".to_string(),
                        errors: None,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
