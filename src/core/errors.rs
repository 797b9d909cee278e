//! Error types for the provider gateway and the scanner.

use thiserror::Error;

/// Failure of a single upstream request
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid response: {0}")]
    Parse(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl GatewayError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::Parse(format!("bad endpoint url: {}", err))
    }
}

/// Reasons a scan could not be started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("A scan is already running")]
    AlreadyRunning,

    #[error("No scannable wallets supplied")]
    NoWallets,
}
