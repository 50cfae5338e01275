//! HTTP control-plane error handling: maps internal failures to a small,
//! plain JSON error body and status code (no JSON-RPC envelope — this
//! surface is four REST routes, not a protocol transport).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("engine not yet initialized")]
    NotInitialized,
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("malformed request body: {0}")]
    BadRequest(String),
    #[error("rate limit exceeded")]
    RateLimited,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl HttpError {
    fn status_code(&self) -> StatusCode {
        match self {
            HttpError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody { error: self.to_string() };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;
