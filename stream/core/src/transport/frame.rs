//! Transport Frames
//!
//! A [`Frame`] is one discrete unit of wire traffic: a kind plus raw bytes.
//! It is what callers enqueue for the outbound pump and what the inbound pump
//! hands to consumers. Conversion to and from `tungstenite` messages lives
//! here so the pumps stay free of payload details.
//!
//! Close frames carry the RFC 6455 layout: a big-endian `u16` code followed by
//! an optional UTF-8 reason.

use serde::Serialize;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::TransportError;

/// Frame kinds
///
/// Maps to the WebSocket opcodes the transport deals with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Text frame (UTF-8, JSON envelopes)
    Text,
    /// Binary frame (raw audio bytes)
    Binary,
    /// Ping frame (keepalive probe)
    Ping,
    /// Pong frame (keepalive response)
    Pong,
    /// Close frame (connection termination)
    Close,
}

impl FrameKind {
    /// Check if this is a data frame (text or binary)
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Text | Self::Binary)
    }
}

/// One unit of transport traffic
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind
    pub kind: FrameKind,
    /// Raw payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a text frame
    #[must_use]
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: payload.into().into_bytes(),
        }
    }

    /// Create a binary frame
    #[must_use]
    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: FrameKind::Binary,
            payload: payload.into(),
        }
    }

    /// Create a close frame
    #[must_use]
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = code.to_be_bytes().to_vec();
        payload.extend_from_slice(reason.as_bytes());
        Self {
            kind: FrameKind::Close,
            payload,
        }
    }

    /// Serialize a value into a JSON text frame
    ///
    /// # Errors
    ///
    /// Returns `TransportError::SerializationError` if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, TransportError> {
        let json = serde_json::to_string(value)?;
        Ok(Self::text(json))
    }

    /// Get the payload length
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as UTF-8, if it is valid UTF-8
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Convert into a wire message
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidFrame` if a text frame is not UTF-8.
    pub fn into_message(self) -> Result<Message, TransportError> {
        let message = match self.kind {
            FrameKind::Text => Message::Text(String::from_utf8(self.payload).map_err(|e| {
                TransportError::InvalidFrame(format!("text frame is not UTF-8: {e}"))
            })?),
            FrameKind::Binary => Message::Binary(self.payload),
            FrameKind::Ping => Message::Ping(self.payload),
            FrameKind::Pong => Message::Pong(self.payload),
            FrameKind::Close => Message::Close(decode_close(&self.payload)),
        };
        Ok(message)
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Self::text(text),
            Message::Binary(data) => Self::binary(data),
            Message::Ping(payload) => Self {
                kind: FrameKind::Ping,
                payload,
            },
            Message::Pong(payload) => Self {
                kind: FrameKind::Pong,
                payload,
            },
            Message::Close(Some(close)) => Self::close(close.code.into(), &close.reason),
            Message::Close(None) => Self {
                kind: FrameKind::Close,
                payload: Vec::new(),
            },
            Message::Frame(raw) => Self::binary(raw.into_data()),
        }
    }
}

fn decode_close(payload: &[u8]) -> Option<CloseFrame<'static>> {
    let [hi, lo, reason @ ..] = payload else {
        return None;
    };
    Some(CloseFrame {
        code: CloseCode::from(u16::from_be_bytes([*hi, *lo])),
        reason: String::from_utf8_lossy(reason).into_owned().into(),
    })
}
