//! Transport Traits
//!
//! The socket seam and the transport error taxonomy.
//!
//! The pumps never touch a concrete socket type. They drive any
//! [`WireSink`]/[`WireStream`] pair, which is what a split
//! `tokio_tungstenite::WebSocketStream` provides, and what tests provide
//! with in-memory channels.

use std::time::Duration;

use futures::{Sink, Stream};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Write half of a WebSocket-class connection
pub trait WireSink: Sink<Message, Error = WsError> + Send + Unpin + 'static {}

impl<T> WireSink for T where T: Sink<Message, Error = WsError> + Send + Unpin + 'static {}

/// Read half of a WebSocket-class connection
pub trait WireStream: Stream<Item = Result<Message, WsError>> + Send + Unpin + 'static {}

impl<T> WireStream for T where
    T: Stream<Item = Result<Message, WsError>> + Send + Unpin + 'static
{
}

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Dialing or the WebSocket handshake failed
    #[error("Connection to {url} failed: {source}")]
    ConnectionFailed {
        /// Target URL
        url: String,
        /// Underlying handshake error
        #[source]
        source: WsError,
    },

    /// Dialing did not complete in time
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The connect request could not be built (bad URL or header)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Writing a frame failed
    #[error("Write failed: {0}")]
    WriteFailed(#[source] WsError),

    /// Writing a frame exceeded the write deadline
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Reading from the connection failed
    #[error("Read failed: {0}")]
    ReadFailed(#[source] WsError),

    /// No pong arrived before the read deadline
    #[error("Read deadline expired: no pong within {0:?}")]
    ReadTimeout(Duration),

    /// Peer sent a message larger than the configured limit
    #[error("Inbound message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Peer closed the connection with a code outside the expected set
    #[error("Connection closed unexpectedly with code {code}: {reason}")]
    UnexpectedClose {
        /// WebSocket close code
        code: u16,
        /// Close reason sent by the peer
        reason: String,
    },

    /// The outbound queue was closed
    #[error("Channel closed")]
    ChannelClosed,

    /// A frame could not be converted for the wire
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// JSON serialization of an outbound envelope failed
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Transport not in expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TransportError {
    /// Whether this error ended the read side in a way the peer did not
    /// announce (timeout, oversized frame, unexpected close code, I/O failure)
    #[must_use]
    pub fn is_unexpected_closure(&self) -> bool {
        matches!(
            self,
            Self::ReadFailed(_)
                | Self::ReadTimeout(_)
                | Self::MessageTooLarge { .. }
                | Self::UnexpectedClose { .. }
        )
    }
}
