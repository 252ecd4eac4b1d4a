//! Stream Aggregation
//!
//! Folds a sequence of partial responses into one cumulative response.
//!
//! # Merge Rules
//!
//! - The first successful record's choices are adopted wholesale.
//! - Later records append their choice-0 text onto the accumulated choice-0
//!   content; role and finish reason take the latest value seen.
//! - Request id and usage are refreshed from every record.
//!
//! The per-chunk callback runs before each merge. A record with its error
//! slot set, a record with no choices, or a callback error ends the session
//! with an error and nothing partial is returned.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::content::MessageContent;
use crate::error::Error;
use crate::response::ChatResponse;
use crate::sse::EventRecord;

/// Per-chunk callback
///
/// Returning an error stops the session; it is the only way to cancel an
/// aggregation mid-stream.
#[async_trait]
pub trait ChunkHandler: Send {
    /// Handle the bytes of one chunk
    async fn on_chunk(&mut self, chunk: &[u8]) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> ChunkHandler for F
where
    F: FnMut(&[u8]) -> anyhow::Result<()> + Send,
{
    async fn on_chunk(&mut self, chunk: &[u8]) -> anyhow::Result<()> {
        (self)(chunk)
    }
}

/// Accumulates partial responses for one session
#[derive(Debug)]
pub struct StreamAggregator<C> {
    result: ChatResponse<C>,
    chunks: usize,
}

impl<C> Default for StreamAggregator<C> {
    fn default() -> Self {
        Self {
            result: ChatResponse::default(),
            chunks: 0,
        }
    }
}

impl<C: MessageContent> StreamAggregator<C> {
    /// Create an empty aggregator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks merged so far
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Process one record: check it, hand its chunk to `handler`, merge it
    ///
    /// # Errors
    ///
    /// - `Error::Stream` if the record's error slot is set
    /// - `Error::EmptyResponse` if the record has no choices
    /// - `Error::Callback` if the handler fails
    pub async fn accept<H>(
        &mut self,
        record: EventRecord<ChatResponse<C>>,
        handler: &mut H,
    ) -> Result<(), Error>
    where
        H: ChunkHandler + ?Sized,
    {
        let data = record.into_result().map_err(|error| {
            tracing::debug!(chunks = self.chunks, error = %error, "Stream error record");
            Error::Stream(error)
        })?;

        let Some(partial) = data else {
            return Err(Error::EmptyResponse);
        };
        let Some(first) = partial.choices.first() else {
            return Err(Error::EmptyResponse);
        };

        let chunk = first.message.content.to_bytes();
        handler.on_chunk(&chunk).await.map_err(Error::Callback)?;

        self.merge(partial);
        Ok(())
    }

    /// Merge a partial response into the accumulated one
    pub fn merge(&mut self, partial: ChatResponse<C>) {
        let ChatResponse {
            request_id,
            usage,
            choices,
        } = partial;

        if self.chunks == 0 {
            self.result.choices = choices;
        } else if let (Some(acc), Some(delta)) =
            (self.result.choices.first_mut(), choices.into_iter().next())
        {
            acc.message
                .content
                .append_text(&delta.message.content.to_text());
            acc.message.role = delta.message.role;
            acc.finish_reason = delta.finish_reason;
        }

        self.result.request_id = request_id;
        self.result.usage = usage;
        self.chunks += 1;
    }

    /// Finalize the session
    #[must_use]
    pub fn finish(self) -> ChatResponse<C> {
        tracing::debug!(
            chunks = self.chunks,
            request_id = %self.result.request_id,
            "Aggregation finished"
        );
        self.result
    }
}

/// Drain a record channel into one cumulative response
///
/// Returns when the channel closes (success) or at the first failure. On
/// failure the receiver is dropped, which stops the producer.
///
/// # Errors
///
/// See [`StreamAggregator::accept`].
pub async fn aggregate<C, H>(
    mut records: mpsc::Receiver<EventRecord<ChatResponse<C>>>,
    handler: &mut H,
) -> Result<ChatResponse<C>, Error>
where
    C: MessageContent,
    H: ChunkHandler + ?Sized,
{
    let mut aggregator = StreamAggregator::new();
    while let Some(record) = records.recv().await {
        aggregator.accept(record, handler).await?;
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::content::{ContentPart, MultiModalContent, TextContent};
    use crate::response::{ChatMessage, Choice};
    use crate::sse::RecordError;

    fn chunk(text: &str, finish_reason: Option<&str>) -> EventRecord<ChatResponse<TextContent>> {
        EventRecord::with_data(ChatResponse {
            request_id: format!("req-{text}"),
            usage: Some(serde_json::json!({"output_tokens": text.len()})),
            choices: vec![Choice {
                message: ChatMessage {
                    role: "assistant".into(),
                    content: TextContent::new(text),
                },
                finish_reason: finish_reason.map(str::to_string),
            }],
        })
    }

    async fn run(
        records: Vec<EventRecord<ChatResponse<TextContent>>>,
    ) -> (Result<ChatResponse<TextContent>, Error>, Vec<String>) {
        let (tx, rx) = mpsc::channel(records.len().max(1));
        for record in records {
            tx.send(record).await.unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        let mut handler = |chunk: &[u8]| -> anyhow::Result<()> {
            seen.push(String::from_utf8_lossy(chunk).into_owned());
            Ok(())
        };
        let result = aggregate(rx, &mut handler).await;
        (result, seen)
    }

    #[tokio::test]
    async fn test_chunks_concatenate_in_order() {
        let (result, seen) = run(vec![
            chunk("Hel", None),
            chunk("lo, ", None),
            chunk("world", Some("stop")),
        ])
        .await;

        let response = result.unwrap();
        assert_eq!(response.text(), "Hello, world");
        assert_eq!(seen, vec!["Hel", "lo, ", "world"]);
        assert_eq!(response.finish_reason(), Some("stop"));
        assert_eq!(response.request_id, "req-world");
        assert_eq!(response.usage.unwrap()["output_tokens"], 5);
    }

    #[tokio::test]
    async fn test_error_record_stops_aggregation() {
        let (result, seen) = run(vec![
            chunk("a", None),
            chunk("b", None),
            EventRecord::failed(RecordError::Remote("throttled".into())),
            chunk("c", None),
        ])
        .await;

        assert!(matches!(
            result,
            Err(Error::Stream(RecordError::Remote(ref m))) if m == "throttled"
        ));
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_leading_error_record() {
        let (result, seen) = run(vec![EventRecord::failed(RecordError::HttpStatus {
            status: 500,
            body: "oops".into(),
        })])
        .await;

        assert!(matches!(result, Err(Error::Stream(_))));
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_no_records_is_empty_success() {
        let (result, seen) = run(Vec::new()).await;

        let response = result.unwrap();
        assert!(response.choices.is_empty());
        assert_eq!(response.request_id, "");
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_zero_choices_is_empty_response() {
        let empty = EventRecord::with_data(ChatResponse::<TextContent>::default());
        let (result, seen) = run(vec![empty]).await;

        assert!(matches!(result, Err(Error::EmptyResponse)));
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_record_without_data_is_empty_response() {
        let record = EventRecord {
            id: Some("1".into()),
            ..EventRecord::new()
        };
        let (result, _) = run(vec![record]).await;
        assert!(matches!(result, Err(Error::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_callback_error_stops_session() {
        let (tx, rx) = mpsc::channel(4);
        for text in ["one", "two", "three"] {
            tx.send(chunk(text, None)).await.unwrap();
        }
        drop(tx);

        let mut calls = 0;
        let mut handler = |_chunk: &[u8]| -> anyhow::Result<()> {
            calls += 1;
            if calls == 2 {
                anyhow::bail!("client went away");
            }
            Ok(())
        };

        let result = aggregate(rx, &mut handler).await;
        assert!(matches!(
            result,
            Err(Error::Callback(ref e)) if e.to_string() == "client went away"
        ));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_role_is_last_write_wins() {
        let mut aggregator = StreamAggregator::<TextContent>::new();
        let mut first = chunk("x", None).data.unwrap();
        first.choices[0].message.role = "assistant".into();
        aggregator.merge(first);

        let mut second = chunk("y", Some("length")).data.unwrap();
        second.choices[0].message.role = "tool".into();
        aggregator.merge(second);

        assert_eq!(aggregator.chunks(), 2);
        let response = aggregator.finish();
        assert_eq!(response.choices[0].message.role, "tool");
        assert_eq!(response.text(), "xy");
        assert_eq!(response.finish_reason(), Some("length"));
    }

    #[tokio::test]
    async fn test_multimodal_aggregation() {
        let part = |text: &str| ChatResponse {
            request_id: String::new(),
            usage: None,
            choices: vec![Choice {
                message: ChatMessage {
                    role: "assistant".into(),
                    content: MultiModalContent(vec![ContentPart::text(text)]),
                },
                finish_reason: None,
            }],
        };

        let (tx, rx) = mpsc::channel(2);
        tx.send(EventRecord::with_data(part("a "))).await.unwrap();
        tx.send(EventRecord::with_data(part("cat"))).await.unwrap();
        drop(tx);

        let mut handler = |_: &[u8]| -> anyhow::Result<()> { Ok(()) };
        let response = aggregate(rx, &mut handler).await.unwrap();
        assert_eq!(response.text(), "a cat");
        assert_eq!(response.choices[0].message.content.parts().len(), 1);
    }
}
