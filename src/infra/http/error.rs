use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::application::photos::PhotoError;
use crate::application::repos::RepoError;
use crate::domain::photos::FieldError;

/// A request failure with an HTTP classification and a JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    fields: Vec<FieldError>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [FieldError],
}

fn no_fields(fields: &&[FieldError]) -> bool {
    fields.is_empty()
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Sign in to do that")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(err: &dyn std::error::Error) -> Self {
        error!(error = %err, "internal error while handling request");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Request could not be processed".to_string(),
            fields,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: &self.message,
            fields: &self.fields,
        })
        .into_response();

        (self.status, body).into_response()
    }
}

impl From<PhotoError> for ApiError {
    fn from(err: PhotoError) -> Self {
        match err {
            PhotoError::NotFound => Self::not_found("Photo not found"),
            PhotoError::Forbidden { .. } => Self::forbidden(err.to_string()),
            PhotoError::Validation(errors) => Self::validation(errors.0),
            PhotoError::AlreadyVoted => Self::conflict(err.to_string()),
            PhotoError::Encode(inner) => Self::internal(&inner),
            PhotoError::Repo(inner) => Self::from(inner),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::not_found("Resource not found"),
            RepoError::Duplicate { .. } => Self::conflict("Resource already exists"),
            RepoError::InvalidInput { message } => Self::bad_request(message),
            RepoError::Timeout => Self::unavailable("Storage timed out"),
            RepoError::Persistence(_) | RepoError::Integrity { .. } => Self::internal(&err),
        }
    }
}
