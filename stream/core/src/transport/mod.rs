//! Duplex Transport Layer
//!
//! A persistent, bidirectional WebSocket connection driven by two pumps:
//! - outbound: bounded queue -> socket, with a per-write deadline and pings
//! - inbound: socket -> bounded queue, with a read deadline refreshed by pongs
//!
//! # Design Philosophy
//!
//! The transport knows frames, not payloads. JSON envelopes, audio bytes and
//! task protocols belong to the pipeline layer. Concurrency is expressed with
//! bounded channels only; there is no lock around the socket.
//!
//! # Failure Reporting
//!
//! Unexpected closures (read timeout, oversized frame, unknown close code,
//! I/O failure) and write failures land in a single-slot error channel.
//! Peer-initiated normal closures are not errors.

pub mod config;
mod duplex;
pub mod frame;
mod pumps;
pub mod traits;

// Re-exports for convenience
pub use config::TransportConfig;
pub use duplex::{DuplexTransport, OutboundSender};
pub use frame::{Frame, FrameKind};
pub use traits::{TransportError, WireSink, WireStream};
