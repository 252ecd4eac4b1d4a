//! Recognition Pipeline (duplex)
//!
//! A recognition session is one duplex connection:
//!
//! 1. [`connect_recognition`] dials, then writes the start envelope and waits
//!    for that write to complete.
//! 2. An upload task streams audio as binary frames through an
//!    [`OutboundSender`] ([`upload_audio`]).
//! 3. [`handle_recognition_results`] races inbound frames, transport errors
//!    and cancellation, feeding data frames to the chunk callback.
//! 4. The caller closes the transport; cancellation does not close it.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::cancel::CancelSignal;
use crate::aggregate::ChunkHandler;
use crate::error::Error;
use crate::transport::{DuplexTransport, Frame, OutboundSender, TransportConfig, TransportError};

/// Generate a task identifier: 32 lowercase hex characters
#[must_use]
pub fn generate_task_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Open a recognition connection and send the start envelope
///
/// `token` is sent verbatim as the `Authorization` header.
///
/// # Errors
///
/// - `Error::Encode` if `start` cannot be serialized
/// - `Error::Connect` if dialing fails or the start envelope is not written
pub async fn connect_recognition<B>(
    url: &str,
    token: &str,
    start: &B,
    config: TransportConfig,
) -> Result<DuplexTransport, Error>
where
    B: Serialize + ?Sized,
{
    let envelope = serde_json::to_string(start).map_err(Error::Encode)?;

    let transport = DuplexTransport::connect(url, [("Authorization", token)], config)
        .await
        .map_err(Error::Connect)?;

    if let Err(e) = transport.send_confirmed(Frame::text(envelope)).await {
        tracing::warn!(error = %e, "Start envelope not delivered");
        if let Err(close_err) = transport.close().await {
            tracing::debug!(error = %close_err, "Close after failed start");
        }
        return Err(Error::Connect(e));
    }

    tracing::debug!(url, "Recognition session started");
    Ok(transport)
}

/// Stream audio from `reader` as binary frames
///
/// Reads up to `chunk_size` bytes at a time and pauses `interval` between
/// frames (zero for no pacing). Returns the number of bytes sent.
///
/// # Errors
///
/// - `Error::Io` if reading fails
/// - `Error::ChannelClosed` if the transport closes mid-upload
pub async fn upload_audio<R>(
    sender: &OutboundSender,
    mut reader: R,
    chunk_size: usize,
    interval: Duration,
) -> Result<u64, Error>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut sent = 0u64;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        sender.send_binary(&buffer[..n]).await?;
        sent += n as u64;

        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    tracing::debug!(bytes = sent, "Audio upload finished");
    Ok(sent)
}

/// Consume a recognition session's results
///
/// Whichever of {inbound frame, transport error, cancellation} is ready first
/// decides the next step. Text and binary frames go to `handler`. When the
/// inbound channel closes, a pending transport error is returned if there is
/// one; otherwise the session ended normally.
///
/// # Errors
///
/// - `Error::Transport` for an unexpected closure or write failure
/// - `Error::Callback` if `handler` fails
/// - `Error::Cancelled` with the signal's reason
pub async fn handle_recognition_results<H>(
    mut inbound: mpsc::Receiver<Frame>,
    mut errors: mpsc::Receiver<TransportError>,
    cancel: &CancelSignal,
    handler: &mut H,
) -> Result<(), Error>
where
    H: ChunkHandler + ?Sized,
{
    let mut errors_open = true;
    let mut frames = 0usize;

    loop {
        tokio::select! {
            frame = inbound.recv() => {
                let Some(frame) = frame else {
                    return match errors.try_recv() {
                        Ok(err) => Err(Error::from(err)),
                        Err(_) => {
                            tracing::debug!(frames, "Recognition results finished");
                            Ok(())
                        }
                    };
                };
                if frame.kind.is_data() {
                    frames += 1;
                    handler.on_chunk(&frame.payload).await.map_err(Error::Callback)?;
                }
            }
            err = errors.recv(), if errors_open => {
                match err {
                    Some(err) => return Err(Error::from(err)),
                    None => errors_open = false,
                }
            }
            reason = cancel.cancelled() => {
                tracing::debug!(frames, reason = %reason, "Recognition cancelled");
                return Err(Error::Cancelled(reason));
            }
        }
    }
}
