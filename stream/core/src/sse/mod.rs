//! Server-Push Event Decoding
//!
//! Turns an HTTP response body into a lazy sequence of [`EventRecord`]s:
//!
//! ```text
//! bytes_stream ──► LineStream ──► EventStream (EventDecoder) ──► records
//! ```
//!
//! One record is emitted per blank-line-delimited block. Recognized fields
//! are `id:`, `event:`, `:HTTP_STATUS/<code>` and `data:`; anything else is
//! logged and skipped so new server fields never break a stream.

pub mod decoder;
pub mod lines;
pub mod record;

pub use decoder::{decode_events, EventDecoder, EventStream};
pub use lines::LineStream;
pub use record::{EventRecord, RecordError};
