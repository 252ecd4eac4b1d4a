//! Crate-Level Error
//!
//! Every terminal failure of a pipeline is one [`Error`] value naming the
//! stage that produced it and carrying the underlying cause. Callers get
//! either a complete response or an error, never both.

use thiserror::Error;

use crate::sse::RecordError;
use crate::transport::TransportError;

/// Errors surfaced by the streaming pipelines
#[derive(Debug, Error)]
pub enum Error {
    /// Establishing the duplex connection failed
    #[error("Connect failed: {0}")]
    Connect(#[source] TransportError),

    /// The duplex transport failed mid-session
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    /// A decoded event carried an error (protocol error frame, decode
    /// failure, request failure)
    #[error("Stream error: {0}")]
    Stream(#[from] RecordError),

    /// A response carried zero choices
    #[error("Empty response: no choices returned")]
    EmptyResponse,

    /// The per-chunk callback returned an error
    #[error("Chunk callback failed: {0}")]
    Callback(anyhow::Error),

    /// The external cancellation signal fired
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A send was attempted on, or pending when, the outbound queue closed
    #[error("Channel closed")]
    ChannelClosed,

    /// Building or sending an HTTP request failed
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered a non-streaming request with a failure status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// A request body or start envelope could not be serialized
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// A whole (non-streaming) response body was not a valid response
    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Reading local input (e.g. an audio source) failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Name of the stage that produced the error
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Transport(_) => "transport",
            Self::Stream(RecordError::Decode { .. } | RecordError::Status { .. })
            | Self::Decode(_) => "decode",
            Self::Stream(RecordError::Request(_) | RecordError::HttpStatus { .. }) => "request",
            Self::Stream(RecordError::Remote(_) | RecordError::Body(_)) => "stream",
            Self::EmptyResponse => "aggregate",
            Self::Callback(_) => "callback",
            Self::Cancelled(_) => "cancel",
            Self::ChannelClosed => "send",
            Self::Request(_) | Self::HttpStatus { .. } => "request",
            Self::Encode(_) => "encode",
            Self::Io(_) => "input",
        }
    }

    /// Whether the error came from the external cancellation signal
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ChannelClosed => Self::ChannelClosed,
            other => Self::Transport(other),
        }
    }
}
