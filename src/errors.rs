use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Domain-specific error types for the simulator.
/// Numeric failures are surfaced synchronously to the caller of the single
/// operation that hit them. Skipped log-returns are not errors; they are
/// counted on the volatility estimate.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no data available: {0}")]
    NoData(String),

    #[error("a replay is already running")]
    ReplayActive,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("state corruption: {0}")]
    StateCorruption(String),
}

impl SimError {
    pub fn status(&self) -> StatusCode {
        match self {
            SimError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SimError::InsufficientData(_) | SimError::NoData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SimError::ReplayActive => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SimError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<reqwest::Error> for SimError {
    fn from(e: reqwest::Error) -> Self {
        SimError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Parse(e.to_string())
    }
}

impl From<csv::Error> for SimError {
    fn from(e: csv::Error) -> Self {
        SimError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::Io(e.to_string())
    }
}

pub type SimResult<T> = Result<T, SimError>;
