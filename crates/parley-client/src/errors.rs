//! Client error types.

use thiserror::Error;

/// Failures of the streaming transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The WebSocket layer failed.
    #[error("websocket error: {0}")]
    WebSocket(#[source] Box<tokio_tungstenite::tungstenite::Error>),
    /// The peer end of an in-memory transport went away.
    #[error("transport closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Frame encoding or decoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Text was not a valid frame.
    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Encoder produced non-UTF-8 output.
    #[error("encoded frame is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors surfaced by the public client API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Login was rejected (HTTP 400).
    #[error("improper credentials have been passed")]
    Auth,

    /// An expected-success call returned another status.
    #[error("HTTP {status}: {message}")]
    Protocol {
        /// Response status code.
        status: u16,
        /// Server-provided message, or the status text.
        message: String,
    },

    /// HTTP 403.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Server-provided message.
        message: String,
    },

    /// HTTP 404.
    #[error("not found: {message}")]
    NotFound {
        /// Server-provided message.
        message: String,
    },

    /// An operation needing a session token ran before login.
    #[error("you must be logged in to do this")]
    NotAuthenticated,

    /// `connect` ran while a connection was already open.
    #[error("already connected")]
    AlreadyConnected,

    /// Gateway discovery did not return 200.
    #[error("gateway endpoint unavailable (HTTP {status})")]
    EndpointUnavailable {
        /// Response status code.
        status: u16,
    },

    /// A destination could not be resolved to a channel id.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// Malformed call arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP transport failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Streaming transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Response body was not the expected JSON.
    #[error("invalid response JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
