use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::api::ErrorResponse;

/// Errors surfaced by the fetch / filter / profile pipeline
#[derive(Debug, Error)]
pub enum OraError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not resolve ENS name '{input}'")]
    NotFound { input: String },

    #[error("Upstream error{}: {message}", .status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Upstream { status: Option<u16>, message: String },

    #[error("{provider} rate limit exceeded, try again later")]
    RateLimited { provider: String },

    #[error("Malformed import: {0}")]
    MalformedImport(String),

    #[error("Request superseded by a newer load")]
    Superseded,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl OraError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        OraError::Upstream {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        OraError::Upstream {
            status: None,
            message: err.to_string(),
        }
    }

    /// User-facing message category
    pub fn category(&self) -> &'static str {
        match self {
            OraError::InvalidInput(_) => "bad_input",
            OraError::NotFound { .. } => "not_found",
            OraError::Upstream { status: Some(s), .. } if (400..500).contains(s) => "bad_input",
            OraError::Upstream { .. } => "server_error",
            OraError::RateLimited { .. } => "rate_limited",
            OraError::MalformedImport(_) => "malformed_import",
            OraError::Superseded => "conflict",
            OraError::Storage(_) | OraError::InvalidConfig(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OraError::InvalidInput(_) | OraError::NotFound { .. } => StatusCode::BAD_REQUEST,
            OraError::Upstream { status: Some(s), .. } if (400..500).contains(s) => {
                StatusCode::BAD_REQUEST
            }
            OraError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            OraError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            OraError::MalformedImport(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OraError::Superseded => StatusCode::CONFLICT,
            OraError::Storage(_) | OraError::InvalidConfig(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for OraError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                category: self.category().to_string(),
            }),
        )
            .into_response()
    }
}
