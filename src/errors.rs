use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MarketError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(dealflow::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(dealflow::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(dealflow::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Platform request failed: {0}")]
    #[diagnostic(code(dealflow::http))]
    Http(#[from] reqwest::Error),

    #[error("Store error ({status}): {message}")]
    #[diagnostic(code(dealflow::store))]
    Store { status: u16, message: String },

    #[error("Mail provider error ({status}): {message}")]
    #[diagnostic(code(dealflow::mail))]
    Mail { status: u16, message: String },

    #[error("{0}")]
    #[diagnostic(code(dealflow::unauthorized))]
    Unauthorized(String),

    #[error("{0}")]
    #[diagnostic(code(dealflow::forbidden))]
    Forbidden(String),

    #[error("{0}")]
    #[diagnostic(code(dealflow::bad_request))]
    BadRequest(String),

    #[error("{0}")]
    #[diagnostic(code(dealflow::not_found))]
    NotFound(String),

    #[error("{0}")]
    #[diagnostic(code(dealflow::other))]
    Other(String),
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = match &self {
            MarketError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::BadRequest(_) => StatusCode::BAD_REQUEST,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Store failures are surfaced verbatim; the caller re-triggers the
        // action manually, nothing is retried here.
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
