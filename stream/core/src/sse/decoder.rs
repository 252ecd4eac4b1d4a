//! Event Decoder
//!
//! [`EventDecoder`] is the stateful core: feed it lines, get a record back on
//! each blank line that closes a non-empty block. [`EventStream`] drives a
//! decoder over a line stream.
//!
//! A decoder holds exactly one in-progress record. It is not shared: each
//! stream owns its own.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use serde::de::DeserializeOwned;

use super::record::{EventRecord, RecordError};

const ID_PREFIX: &str = "id:";
const EVENT_PREFIX: &str = "event:";
const STATUS_PREFIX: &str = ":HTTP_STATUS/";
const DATA_PREFIX: &str = "data:";

/// Event name whose `data:` payload is an error message, not a response
const ERROR_EVENT: &str = "error";

/// Strip a field prefix and at most one following space
fn field<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
}

/// Line-by-line server-push event decoder
#[derive(Debug)]
pub struct EventDecoder<T> {
    current: EventRecord<T>,
}

impl<T> Default for EventDecoder<T> {
    fn default() -> Self {
        Self {
            current: EventRecord::new(),
        }
    }
}

impl<T: DeserializeOwned> EventDecoder<T> {
    /// Create a decoder with no block in progress
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator)
    ///
    /// Returns the finished record when `line` is blank and closes a block
    /// that populated at least one field.
    pub fn push_line(&mut self, line: &str) -> Option<EventRecord<T>> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.take();
        }

        if let Some(value) = field(line, DATA_PREFIX) {
            self.on_data(value);
        } else if let Some(value) = field(line, ID_PREFIX) {
            self.current.id = Some(value.to_string());
        } else if let Some(value) = field(line, EVENT_PREFIX) {
            self.current.event = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix(STATUS_PREFIX) {
            self.on_status(value.trim());
        } else if line.starts_with(':') {
            tracing::trace!(line, "Skipping comment line");
        } else {
            tracing::warn!(line, "Discarding unrecognized event line");
        }

        None
    }

    /// Flush a block left open when the source ended
    pub fn finish(&mut self) -> Option<EventRecord<T>> {
        self.take()
    }

    /// Drop any block in progress
    pub fn reset(&mut self) {
        self.current = EventRecord::new();
    }

    fn take(&mut self) -> Option<EventRecord<T>> {
        if self.current.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.current))
    }

    fn on_data(&mut self, payload: &str) {
        if self.current.event.as_deref() == Some(ERROR_EVENT) {
            self.current
                .set_error(RecordError::Remote(payload.to_string()));
            return;
        }

        match serde_json::from_str::<T>(payload) {
            Ok(data) => {
                if self.current.data.is_some() {
                    tracing::debug!("Multiple data lines in one block, keeping the last");
                }
                self.current.data = Some(data);
            }
            Err(source) => {
                tracing::warn!(error = %source, "Failed to decode event data");
                self.current.set_error(RecordError::Decode {
                    source,
                    payload: payload.to_string(),
                });
            }
        }
    }

    fn on_status(&mut self, value: &str) {
        match value.parse::<u16>() {
            Ok(status) => self.current.http_status = Some(status),
            Err(source) => self.current.set_error(RecordError::Status {
                value: value.to_string(),
                source,
            }),
        }
    }
}

pin_project! {
    /// Lazy, finite sequence of records decoded from a line stream
    ///
    /// Ends when the line source ends. A line source error is emitted as one
    /// failed record, after which the stream ends.
    pub struct EventStream<S, T> {
        #[pin]
        lines: S,
        decoder: EventDecoder<T>,
        done: bool,
    }
}

/// Decode a line stream into event records
pub fn decode_events<S, E, T>(lines: S) -> EventStream<S, T>
where
    S: Stream<Item = Result<String, E>>,
    E: Into<RecordError>,
    T: DeserializeOwned,
{
    EventStream {
        lines,
        decoder: EventDecoder::new(),
        done: false,
    }
}

impl<S, E, T> Stream for EventStream<S, T>
where
    S: Stream<Item = Result<String, E>>,
    E: Into<RecordError>,
    T: DeserializeOwned,
{
    type Item = EventRecord<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.done {
                return Poll::Ready(None);
            }

            match ready!(this.lines.as_mut().poll_next(cx)) {
                Some(Ok(line)) => {
                    if let Some(record) = this.decoder.push_line(&line) {
                        return Poll::Ready(Some(record));
                    }
                }
                Some(Err(e)) => {
                    *this.done = true;
                    this.decoder.reset();
                    return Poll::Ready(Some(EventRecord::failed(e.into())));
                }
                None => {
                    *this.done = true;
                    return Poll::Ready(this.decoder.finish());
                }
            }
        }
    }
}
