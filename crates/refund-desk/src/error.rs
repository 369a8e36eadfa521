use crate::config::ConfigError;
use crate::refunds::RepositoryError;
use crate::telemetry::TelemetryError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use tracing::error;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Storage(RepositoryError),
    Template(tera::Error),
    Task(tokio::task::JoinError),
    InvalidRequestId(uuid::Error),
    OperatorAccessClosed,
    OperatorUnauthorized,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Storage(err) => write!(f, "refund store error: {}", err),
            AppError::Template(err) => write!(f, "template error: {}", err),
            AppError::Task(err) => write!(f, "background task failed: {}", err),
            AppError::InvalidRequestId(_) => write!(f, "request id must be a UUID"),
            AppError::OperatorAccessClosed => write!(f, "operator access is not configured"),
            AppError::OperatorUnauthorized => write!(f, "operator credentials required"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Template(err) => Some(err),
            AppError::Task(err) => Some(err),
            AppError::InvalidRequestId(err) => Some(err),
            AppError::OperatorAccessClosed | AppError::OperatorUnauthorized => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Storage(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Storage(RepositoryError::Conflict) => StatusCode::CONFLICT,
            AppError::InvalidRequestId(_) => StatusCode::BAD_REQUEST,
            AppError::OperatorAccessClosed => StatusCode::FORBIDDEN,
            AppError::OperatorUnauthorized => StatusCode::UNAUTHORIZED,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Storage(_)
            | AppError::Template(_)
            | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Storage(value)
    }
}

impl From<tera::Error> for AppError {
    fn from(value: tera::Error) -> Self {
        Self::Template(value)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Task(value)
    }
}

impl From<uuid::Error> for AppError {
    fn from(value: uuid::Error) -> Self {
        Self::InvalidRequestId(value)
    }
}
