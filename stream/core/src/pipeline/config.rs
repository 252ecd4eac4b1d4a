//! Pipeline Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default record channel capacity between producer and aggregator
pub const DEFAULT_RECORD_CAPACITY: usize = 100;

/// Default overall HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for the HTTP/SSE pipeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the bounded record channel
    pub record_capacity: usize,

    /// Timeout for one HTTP request, body included
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            record_capacity: DEFAULT_RECORD_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// Set the record channel capacity
    #[must_use]
    pub fn with_record_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity;
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
