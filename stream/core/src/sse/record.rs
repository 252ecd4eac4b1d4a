//! Event Records
//!
//! The decoded unit of a server-push stream, plus the error that can sit in
//! its error slot.

use std::convert::Infallible;
use std::num::ParseIntError;

use thiserror::Error;

/// Error carried in an [`EventRecord`]'s error slot
#[derive(Debug, Error)]
pub enum RecordError {
    /// The server sent an `event: error` block; the payload is verbatim
    #[error("{0}")]
    Remote(String),

    /// A `data:` payload did not decode into the expected response type
    #[error("Failed to decode event data: {source} (payload: {payload})")]
    Decode {
        /// Decode failure
        #[source]
        source: serde_json::Error,
        /// Offending payload
        payload: String,
    },

    /// The `:HTTP_STATUS/` pseudo-field was not a status code
    #[error("Invalid status field {value:?}: {source}")]
    Status {
        /// Raw field value
        value: String,
        /// Parse failure
        #[source]
        source: ParseIntError,
    },

    /// The HTTP request itself failed
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The server answered with a failure status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Reading the response body failed mid-stream
    #[error("Failed to read response body: {0}")]
    Body(#[from] reqwest::Error),
}

impl From<Infallible> for RecordError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// One decoded block of a server-push stream
#[derive(Debug)]
pub struct EventRecord<T> {
    /// `id:` field
    pub id: Option<String>,
    /// `event:` field
    pub event: Option<String>,
    /// `:HTTP_STATUS/` pseudo-field
    pub http_status: Option<u16>,
    /// Decoded `data:` payload
    pub data: Option<T>,
    /// Error slot; a set slot ends the aggregation session
    pub error: Option<RecordError>,
}

impl<T> Default for EventRecord<T> {
    fn default() -> Self {
        Self {
            id: None,
            event: None,
            http_status: None,
            data: None,
            error: None,
        }
    }
}

impl<T> EventRecord<T> {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record carrying data
    #[must_use]
    pub fn with_data(data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Create a synthetic record that only carries an error
    #[must_use]
    pub fn failed(error: RecordError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Check whether the error slot is set
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check whether no field has been populated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.event.is_none()
            && self.http_status.is_none()
            && self.data.is_none()
            && self.error.is_none()
    }

    /// Set the error slot unless an earlier error already occupies it
    pub fn set_error(&mut self, error: RecordError) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            tracing::debug!(error = %error, "Record already failed, keeping first error");
        }
    }

    /// Split into payload or error
    ///
    /// # Errors
    ///
    /// Returns the record's error if its slot is set.
    pub fn into_result(self) -> Result<Option<T>, RecordError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty() {
        let record = EventRecord::<String>::new();
        assert!(record.is_empty());
        assert!(!record.is_error());
    }

    #[test]
    fn test_first_error_wins() {
        let mut record = EventRecord::<String>::new();
        record.set_error(RecordError::Remote("first".into()));
        record.set_error(RecordError::Remote("second".into()));
        assert_eq!(record.error.unwrap().to_string(), "first");
    }

    #[test]
    fn test_into_result() {
        let ok = EventRecord::with_data(7u32).into_result().unwrap();
        assert_eq!(ok, Some(7));

        let err = EventRecord::<u32>::failed(RecordError::HttpStatus {
            status: 401,
            body: "unauthorized".into(),
        })
        .into_result()
        .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 401: unauthorized");
    }
}
