use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error, mapped onto an HTTP status and a JSON body by the
/// `IntoResponse` impl so handlers can return it directly with `?`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("cache error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("request to external service failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    ExternalApi(String),

    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::HttpRequest(_) | Self::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_)
            | Self::Redis(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to surface to the SPA. Infrastructure failures get a
    /// generic line; the detail stays in the server log.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Database error occurred".to_string(),
            Self::Redis(_) => "Cache error occurred".to_string(),
            Self::Serialization(_) => "Data processing error".to_string(),
            Self::HttpRequest(_) => "External service request failed".to_string(),
            Self::Other(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else if matches!(self, Self::HttpRequest(_) | Self::ExternalApi(_)) {
            tracing::warn!("{}", self);
        }

        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
