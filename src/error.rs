//! Error types for the dashboard.
//!
//! Every fallible path in the crate returns [`DashError`]. Phase failures are
//! stored as their `Display` text so the page can show what went wrong.

use thiserror::Error;

/// Custom error type for dashboard operations.
#[derive(Debug, Error)]
pub enum DashError {
    /// Transport failure or non-success status from the upstream API.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Upstream body was not the JSON shape we expect.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Error with HTTP headers (e.g., invalid API key format).
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),

    /// Configured API base URL cannot carry endpoint paths.
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// Upstream answered successfully but with nothing in it.
    #[error("Empty result from {0}")]
    EmptyResult(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

impl DashError {
    /// True when the error was caused by bad user input rather than upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DashError::UnknownMetric(_) | DashError::UnknownPhase(_))
    }
}

pub type Result<T> = std::result::Result<T, DashError>;
