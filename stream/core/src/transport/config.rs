//! Transport Configuration
//!
//! Timeouts and buffer sizes for the duplex transport. Every value has a
//! documented default; nothing is read from globals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-operation write deadline
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(30);

/// Default inbound liveness window (read deadline, refreshed by pongs)
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(20);

/// Default maximum inbound message size in bytes
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024;

/// Default capacity of the outbound and inbound queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Deadline for writing a single frame
    pub write_wait: Duration,

    /// Read deadline, refreshed on every pong
    ///
    /// Pings go out every 80% of this window.
    pub pong_wait: Duration,

    /// Largest inbound message accepted, in bytes
    pub max_message_size: usize,

    /// Outbound queue capacity (backpressure bound for `send`)
    pub outbound_capacity: usize,

    /// Inbound queue capacity
    pub inbound_capacity: usize,

    /// Error channel capacity
    pub error_capacity: usize,

    /// Deadline for dialing plus the WebSocket handshake
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            write_wait: DEFAULT_WRITE_WAIT,
            pong_wait: DEFAULT_PONG_WAIT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
            inbound_capacity: DEFAULT_QUEUE_CAPACITY,
            error_capacity: 1,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Create a new config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keepalive ping cadence: 80% of the pong window
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 8 / 10
    }

    /// Set the write deadline
    #[must_use]
    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }

    /// Set the pong window
    #[must_use]
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self
    }

    /// Set the inbound message size limit
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Set the outbound queue capacity
    #[must_use]
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Set the inbound queue capacity
    #[must_use]
    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    /// Create a config suitable for testing (shorter intervals)
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            write_wait: Duration::from_millis(500),
            pong_wait: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }
}
