use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

/// One structured validation failure, matching the wire shape the frontend
/// already consumes: `{ "msg": ..., "param": ... }`.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub msg: String,
    pub param: String,
}

impl FieldError {
    pub fn new(param: &str, msg: &str) -> Self {
        Self {
            msg: msg.into(),
            param: param.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("User with this email already exists")]
    Conflict,
    #[error("{0}")]
    Unauthorized(String),
    #[error("Please verify your email before logging in")]
    EmailNotVerified,
    #[error("User not found")]
    NotFound,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AuthError::Conflict,
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Database(e) => AuthError::Internal(e.into()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Validation failed", "errors": errors }),
            ),
            AuthError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "message": message }))
            }
            AuthError::Conflict => (
                StatusCode::CONFLICT,
                json!({ "message": "User with this email already exists" }),
            ),
            AuthError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, json!({ "message": message }))
            }
            AuthError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                json!({ "message": "Please verify your email before logging in" }),
            ),
            AuthError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "message": "User not found" }),
            ),
            AuthError::Internal(err) => {
                // Log the cause; the response stays generic.
                error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_duplicate_maps_to_conflict() {
        let err: AuthError = StoreError::Duplicate.into();
        assert!(matches!(err, AuthError::Conflict));
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: AuthError = StoreError::NotFound.into();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[test]
    fn validation_response_carries_field_errors() {
        let response = AuthError::Validation(vec![FieldError::new("email", "Email is required")])
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
