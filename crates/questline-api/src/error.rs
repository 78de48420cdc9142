//! Questline — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use questline_core::error::StoreError;
use questline_progress::error::{LoadError, SessionLoadError, StartError};
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The quest seed file could not be read or parsed.
    #[error("seed error: {0}")]
    Seed(String),

    /// Tracing or telemetry could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store rejected a startup write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The initial catalog load failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] LoadError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around the coordinator's errors that implements
/// `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// Starting a quest failed.
    Start(StartError),
    /// Reloading the catalog failed.
    Load(LoadError),
    /// Loading an actor session failed.
    Session(SessionLoadError),
    /// A direct store read failed.
    Store(StoreError),
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        Self::Start(err)
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl From<SessionLoadError> for ApiError {
    fn from(err: SessionLoadError) -> Self {
        Self::Session(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

fn store_status(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
        StoreError::Corrupt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_corrupt"),
    }
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Start(StartError::QuestNotFound(_)) => (StatusCode::NOT_FOUND, "quest_not_found"),
            Self::Start(StartError::AlreadyStarted(_)) => (StatusCode::CONFLICT, "already_started"),
            Self::Start(StartError::SessionNotLoaded(_)) => {
                (StatusCode::CONFLICT, "session_not_loaded")
            }
            Self::Load(LoadError::Store(e)) | Self::Session(SessionLoadError::Store(e)) => {
                store_status(e)
            }
            Self::Load(LoadError::Timeout(_)) => (StatusCode::GATEWAY_TIMEOUT, "catalog_load_timeout"),
            Self::Load(LoadError::InvalidDefinition { .. } | LoadError::DuplicateQuest(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "invalid_catalog")
            }
            Self::Session(SessionLoadError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "session_load_timeout")
            }
            Self::Session(SessionLoadError::InvalidRecord(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_progress")
            }
            Self::Session(SessionLoadError::Superseded(_)) => {
                (StatusCode::CONFLICT, "session_load_superseded")
            }
            Self::Store(e) => store_status(e),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Start(e) => e.to_string(),
            Self::Load(e) => e.to_string(),
            Self::Session(e) => e.to_string(),
            Self::Store(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status();

        let body = ErrorBody {
            error: error_code,
            message: self.message(),
        };

        (status, Json(body)).into_response()
    }
}
