//! Crate-wide error taxonomy.
//!
//! Mirrors the kinds (not language types) in the error-handling design: each
//! subsystem absorbs its own transient/provider errors and only escalates a
//! `Fatal` variant to the Engine. Regime emission itself never fails.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Socket close, timeout, 5xx. Handled by reconnect/backoff at the
    /// component level; reflected in health, never surfaced to the classifier.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// 4xx (incl. 451 regional blocks, 401 unauthorized). Component enters
    /// LIMITED; Engine continues.
    #[error("provider rejected request: {0}")]
    ProviderRejection(String),

    /// Parse failure on a WebSocket message or webhook body.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// e.g. best bid >= best ask. Treated like MalformedInput for the
    /// affected snapshot; the ring is not mutated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Task queue full, worker pool all dead.
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    /// E or F cannot initialize, or the HTTP port cannot bind. Escalates to
    /// process exit after best-effort shutdown.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return EngineError::TransientNetwork(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.is_server_error() {
                return EngineError::TransientNetwork(format!("HTTP {status}"));
            }
            return EngineError::ProviderRejection(format!("HTTP {status}"));
        }
        EngineError::TransientNetwork(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::MalformedInput(format!("JSON decode failed: {err}"))
    }
}
