use crate::services::object_store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// An error message tied to the UI form field it should be shown next to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Form field name (`file`, `name`, `path`, `dir`).
    pub id: &'static str,
    pub msg: String,
}

impl FieldError {
    pub fn new(field: &'static str, msg: impl Into<String>) -> Self {
        Self {
            id: field,
            msg: msg.into(),
        }
    }
}

/// Failures of media-source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file or folder not found: {key}")]
    NotFound { key: String },
    #[error("folder already exists: {key}")]
    AlreadyExists { key: String },
    #[error("{reason}: {key}")]
    InvalidOperation { key: String, reason: String },
    #[error("could not create folder: {key}")]
    CreateFailed {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("could not rename or move file: {from} -> {to}")]
    RenameFailed {
        from: String,
        to: String,
        #[source]
        source: StoreError,
    },
    /// A delete that did not confirm. When it followed a successful copy the
    /// object now also exists at `duplicate_at`.
    #[error("could not remove: {key}")]
    DeleteFailed {
        key: String,
        duplicate_at: Option<String>,
        #[source]
        source: StoreError,
    },
    #[error("could not list directory: {directory}")]
    ListingFailed {
        directory: String,
        #[source]
        source: StoreError,
    },
    #[error("{message}")]
    ValidationFailed {
        field: &'static str,
        message: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl SourceError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::InvalidOperation {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SourceError::ValidationFailed {
            field,
            message: message.into(),
        }
    }

    /// Form field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            SourceError::CreateFailed { .. } => "name",
            SourceError::ListingFailed { .. } => "dir",
            SourceError::ValidationFailed { field, .. } => *field,
            _ => "file",
        }
    }

    pub fn to_field_error(&self) -> FieldError {
        FieldError::new(self.field(), self.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SourceError::NotFound { .. } => StatusCode::NOT_FOUND,
            SourceError::AlreadyExists { .. } => StatusCode::CONFLICT,
            SourceError::InvalidOperation { .. } | SourceError::ValidationFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            SourceError::Store(StoreError::InvalidObjectKey(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A lightweight wrapper for errors surfaced over HTTP.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<FieldError>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            errors: Vec::new(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
            "status": self.status.as_u16(),
            "errors": self.errors,
        }));

        (self.status, body).into_response()
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        let field_error = err.to_field_error();
        Self {
            status: err.status(),
            message: err.to_string(),
            errors: vec![field_error],
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ObjectNotFound(key) => AppError::not_found(format!("not found: {key}")),
            StoreError::InvalidObjectKey(key) => {
                AppError::bad_request(format!("invalid object key `{key}`"))
            }
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
