//! Mapping of storage failures onto HTTP responses.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use media_core::{CoreError, ErrorKind};
use serde::Serialize;
use utoipa::ToSchema;

/// Body of every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorRes {
    /// Failure kind, for example `NotFound`
    pub error: String,
    pub message: String,
}

/// A failed request: a kind, the status it maps to, and a human-readable message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            kind,
            message: message.into(),
        }
    }

    pub fn missing_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingParameter, message)
    }

    /// A malformed or oversized multipart body. The status comes from the multipart parser, so
    /// an exceeded body limit is reported as 413.
    pub fn multipart(e: MultipartError) -> Self {
        Self {
            status: e.status(),
            kind: ErrorKind::MissingParameter,
            message: e.body_text(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidAddress | ErrorKind::MissingIdentity | ErrorKind::MissingParameter => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::missing_parameter(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}: {}", self.kind, self.message);
        } else {
            tracing::warn!("{}: {}", self.kind, self.message);
        }
        let body = ErrorRes {
            error: self.kind.as_str().to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_files::FilesError;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (FilesError::InvalidAddress("x".into()), StatusCode::BAD_REQUEST),
            (FilesError::MissingIdentity("x".into()), StatusCode::BAD_REQUEST),
            (FilesError::MissingParameter("x".into()), StatusCode::BAD_REQUEST),
            (FilesError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                FilesError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let api = ApiError::from(CoreError::from(err));
            assert_eq!(api.status(), status);
        }
    }

    #[test]
    fn session_errors_are_server_errors() {
        let api = ApiError::from(CoreError::SessionClosed);
        assert_eq!(api.kind(), ErrorKind::Io);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
