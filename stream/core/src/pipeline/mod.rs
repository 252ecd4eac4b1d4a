//! Pipeline Glue
//!
//! End-to-end wiring of the lower layers into the two session shapes:
//!
//! - **Chat (HTTP/SSE)**: a producer task performs the request and decodes
//!   the body into records; the aggregator consumes them on the caller's
//!   task. See [`ChatClient`].
//! - **Recognition (duplex)**: the transport's inbound and error channels
//!   and an external [`CancelSignal`] are raced in one loop that feeds the
//!   same per-chunk callback. See [`handle_recognition_results`].

pub mod cancel;
pub mod chat;
pub mod config;
pub mod recognition;

pub use cancel::CancelSignal;
pub use chat::{spawn_record_producer, ChatClient};
pub use config::PipelineConfig;
pub use recognition::{
    connect_recognition, generate_task_id, handle_recognition_results, upload_audio,
};
