//! Chat Pipeline (HTTP/SSE)
//!
//! ```text
//!  caller task                         producer task
//!  ───────────                         ─────────────
//!  ChatClient::stream ── spawn ──────► POST, status check
//!        │                             bytes_stream ─► LineStream ─► EventStream
//!        ▼                                                              │
//!  aggregate(records, handler) ◄──── mpsc (record_capacity) ◄───────────┘
//! ```
//!
//! A request failure becomes one synthetic error record, so the aggregator is
//! the single place where a session's outcome is decided.

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

use super::config::PipelineConfig;
use crate::aggregate::{aggregate, ChunkHandler};
use crate::content::MessageContent;
use crate::error::Error;
use crate::response::ChatResponse;
use crate::sse::{decode_events, EventRecord, LineStream, RecordError};

const SSE_HEADER: &str = "X-DashScope-SSE";

/// HTTP client for chat completions, streaming or not
#[derive(Clone, Debug)]
pub struct ChatClient {
    http: reqwest::Client,
    token: String,
    config: PipelineConfig,
}

impl ChatClient {
    /// Create a client with its own HTTP connection pool
    ///
    /// # Errors
    ///
    /// Returns `Error::Request` if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, config: PipelineConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(http, token, config))
    }

    /// Create a client over an existing `reqwest::Client`
    #[must_use]
    pub fn with_client(
        http: reqwest::Client,
        token: impl Into<String>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            http,
            token: token.into(),
            config,
        }
    }

    /// Get the pipeline configuration
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let payload = serde_json::to_vec(body).map_err(Error::Encode)?;
        Ok(self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.token)
            .body(payload))
    }

    /// Send a request and decode the whole response
    ///
    /// # Errors
    ///
    /// - `Error::Request` if the request fails
    /// - `Error::HttpStatus` on a non-success status
    /// - `Error::Encode` if the body cannot be serialized
    /// - `Error::Decode` if the response is not a valid chat response
    /// - `Error::EmptyResponse` if the response has no choices
    pub async fn call<C, B>(&self, url: &str, body: &B) -> Result<ChatResponse<C>, Error>
    where
        C: MessageContent,
        B: Serialize + ?Sized,
    {
        let response = self.post(url, body)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: ChatResponse<C> = serde_json::from_slice(&bytes).map_err(Error::Decode)?;
        if parsed.choices.is_empty() {
            return Err(Error::EmptyResponse);
        }

        tracing::debug!(request_id = %parsed.request_id, "Response received");
        Ok(parsed)
    }

    /// Stream a request, calling `handler` with each chunk, and return the
    /// aggregated response
    ///
    /// # Errors
    ///
    /// - `Error::Encode` if the body cannot be serialized
    /// - `Error::Stream` for request failures, error events and decode failures
    /// - `Error::EmptyResponse` if a record has no choices
    /// - `Error::Callback` if `handler` fails
    pub async fn stream<C, B, H>(
        &self,
        url: &str,
        body: &B,
        handler: &mut H,
    ) -> Result<ChatResponse<C>, Error>
    where
        C: MessageContent,
        B: Serialize + ?Sized,
        H: ChunkHandler + ?Sized,
    {
        let request = self
            .post(url, body)?
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(SSE_HEADER, "enable");

        let records = spawn_record_producer::<C>(request, self.config.record_capacity);
        aggregate(records, handler).await
    }
}

/// Perform an SSE request on a new task and forward its decoded records
///
/// The returned channel yields one record per event block, or a single
/// failed record if the request fails or the status is not a success. The
/// producer stops after forwarding a failed record, and when the receiver is
/// dropped.
pub fn spawn_record_producer<C>(
    request: reqwest::RequestBuilder,
    capacity: usize,
) -> mpsc::Receiver<EventRecord<ChatResponse<C>>>
where
    C: MessageContent,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "SSE request failed");
                let _ = tx.send(EventRecord::failed(RecordError::Request(e))).await;
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "SSE request rejected");
            let _ = tx
                .send(EventRecord::failed(RecordError::HttpStatus {
                    status: status.as_u16(),
                    body,
                }))
                .await;
            return;
        }

        let lines = LineStream::new(response.bytes_stream());
        let records = decode_events::<_, _, ChatResponse<C>>(lines);
        tokio::pin!(records);

        let mut forwarded = 0usize;
        while let Some(record) = records.next().await {
            let failed = record.is_error();
            if tx.send(record).await.is_err() {
                tracing::debug!(forwarded, "Record receiver dropped, stopping producer");
                return;
            }
            forwarded += 1;
            if failed {
                break;
            }
        }

        tracing::debug!(forwarded, "SSE stream finished");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::TextContent;

    const UNREACHABLE: &str = "http://127.0.0.1:1/chat";

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_one_failed_record() {
        let request = reqwest::Client::new().post(UNREACHABLE);
        let mut records = spawn_record_producer::<TextContent>(request, 4);

        let record = records.recv().await.unwrap();
        assert!(matches!(record.error, Some(RecordError::Request(_))));
        assert!(records.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_reports_request_failure_as_stream_error() {
        let client = ChatClient::new("sk-test", PipelineConfig::default()).unwrap();
        let mut calls = 0;
        let mut handler = |_: &[u8]| -> anyhow::Result<()> {
            calls += 1;
            Ok(())
        };

        let result = client
            .stream::<TextContent, _, _>(UNREACHABLE, &serde_json::json!({}), &mut handler)
            .await;

        assert!(matches!(result, Err(Error::Stream(RecordError::Request(_)))));
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_call_reports_request_failure() {
        let client = ChatClient::new("sk-test", PipelineConfig::default()).unwrap();
        let result = client
            .call::<TextContent, _>(UNREACHABLE, &serde_json::json!({}))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Request(_)));
        assert_eq!(err.stage(), "request");
    }
}
