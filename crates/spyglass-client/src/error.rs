//! Client error types.

use thiserror::Error;

/// Client error type.
///
/// A running feed never raises these to its caller; transport failures are
/// absorbed by the retry policy and surface only through the connection
/// phase. Errors here come from constructor validation and the explicit
/// send helpers.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("not connected")]
    NotConnected,
}

/// Client result type.
pub type Result<T> = std::result::Result<T, ClientError>;
