//! dashstream Core - Real-Time Streaming Transport
//!
//! This crate provides the streaming half of a model-serving client: the parts
//! that need concurrency coordination, framing, and incremental state. Request
//! bodies, endpoint selection, and vendor-specific fields are the caller's
//! business; the core only needs "a request value in, a typed response or an
//! error out".
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Caller                                   │
//! │        request body ──┐                  ▲ chunk callback        │
//! └───────────────────────┼──────────────────┼───────────────────────┘
//!                         │                  │
//! ┌───────────────────────┼──────────────────┼───────────────────────┐
//! │                 PIPELINE GLUE            │                       │
//! │   HTTP/SSE:  producer task ──► records ──► StreamAggregator      │
//! │                  │                                               │
//! │             LineStream ─► EventDecoder                           │
//! │                                                                  │
//! │   Duplex:    DuplexTransport ──► inbound/error ──► select! loop  │
//! │              (outbound pump, inbound pump, keepalive)            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Overview
//!
//! - [`transport`]: persistent WebSocket connection with bounded queues,
//!   write/read deadlines and ping keepalive
//! - [`sse`]: line splitting and server-push event decoding
//! - [`aggregate`]: folds partial responses into one cumulative response
//! - [`pipeline`]: end-to-end wiring for chat (SSE) and recognition (duplex)
//! - [`content`]: message content capability and its concrete variants
//! - [`response`]: typed response, choices and messages
//! - [`config`]: TOML + environment configuration loading
//! - [`error`]: crate-level error carrying the failing stage
//!
//! # Quick Start
//!
//! ```ignore
//! use dashstream_core::{ChatClient, PipelineConfig, TextContent};
//!
//! let client = ChatClient::new(token, PipelineConfig::default())?;
//! let mut print = |chunk: &[u8]| -> anyhow::Result<()> {
//!     print!("{}", String::from_utf8_lossy(chunk));
//!     Ok(())
//! };
//! let response = client
//!     .stream::<TextContent, _, _>(url, &body, &mut print)
//!     .await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod config;
pub mod content;
pub mod error;
pub mod pipeline;
pub mod response;
pub mod sse;
pub mod transport;

// Re-exports for convenience
pub use aggregate::{aggregate, ChunkHandler, StreamAggregator};
pub use content::{ContentPart, MessageContent, MultiModalContent, TextContent};
pub use error::Error;
pub use response::{ChatMessage, ChatResponse, Choice};

// Transport exports
pub use transport::{
    DuplexTransport, Frame, FrameKind, OutboundSender, TransportConfig, TransportError,
};

// SSE exports
pub use sse::{decode_events, EventDecoder, EventRecord, EventStream, LineStream, RecordError};

// Pipeline exports
pub use pipeline::{
    connect_recognition, generate_task_id, handle_recognition_results, spawn_record_producer,
    upload_audio, CancelSignal, ChatClient, PipelineConfig,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigSource,
    StreamConfigFile, StreamToml,
};
