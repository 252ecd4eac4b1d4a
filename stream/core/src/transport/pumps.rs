//! Inbound and Outbound Pumps
//!
//! Each duplex connection runs two tasks:
//!
//! - the outbound pump drains the outbound queue into the socket under a
//!   write deadline, and sends a ping every [`TransportConfig::ping_period`];
//! - the inbound pump reads the socket under a read deadline that only a pong
//!   refreshes, and forwards data frames to the inbound queue.
//!
//! Neither pump retries. The first failure is pushed to the error channel
//! (capacity 1) and the pump exits. When the inbound pump exits it fires the
//! read-done signal; the outbound pump then sends a close frame, drops the
//! write half and stops, so the connection is released on either side's
//! failure.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::error::{CapacityError, ProtocolError};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::config::TransportConfig;
use super::frame::Frame;
use super::traits::{TransportError, WireSink, WireStream};

/// A queued outbound frame, optionally waiting for its write result
#[derive(Debug)]
pub(crate) struct Outbound {
    pub(crate) frame: Frame,
    pub(crate) ack: Option<oneshot::Sender<Result<(), TransportError>>>,
}

/// Push an error into the error slot without blocking a terminating pump
pub(crate) fn report(errors: &mpsc::Sender<TransportError>, err: TransportError) {
    match errors.try_send(err) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(err)) => {
            tracing::warn!(error = %err, "Error slot occupied, dropping transport error");
        }
        Err(mpsc::error::TrySendError::Closed(err)) => {
            tracing::debug!(error = %err, "Error channel closed, dropping transport error");
        }
    }
}

async fn write_message<S: WireSink>(
    sink: &mut S,
    message: Message,
    write_wait: Duration,
) -> Result<(), TransportError> {
    match time::timeout(write_wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::WriteFailed(e)),
        Err(_) => Err(TransportError::WriteTimeout(write_wait)),
    }
}

async fn write_outbound<S: WireSink>(
    sink: &mut S,
    item: Outbound,
    write_wait: Duration,
    errors: &mpsc::Sender<TransportError>,
) -> bool {
    let Outbound { frame, ack } = item;
    let result = match frame.into_message() {
        Ok(message) => write_message(sink, message, write_wait).await,
        Err(e) => Err(e),
    };

    // A confirmed send gets its own failure; otherwise the error slot does.
    match (result, ack) {
        (Ok(()), Some(ack)) => {
            let _ = ack.send(Ok(()));
            true
        }
        (Ok(()), None) => true,
        (Err(e), Some(ack)) => {
            tracing::warn!(error = %e, "Confirmed write failed");
            let _ = ack.send(Err(e));
            false
        }
        (Err(e), None) => {
            tracing::warn!(error = %e, "Write failed");
            report(errors, e);
            false
        }
    }
}

/// Drain what is already queued, then say goodbye
async fn shutdown_outbound<S: WireSink>(
    sink: &mut S,
    rx: &mut mpsc::Receiver<Outbound>,
    write_wait: Duration,
    errors: &mpsc::Sender<TransportError>,
) {
    rx.close();
    let mut drained = 0usize;
    while let Ok(item) = rx.try_recv() {
        if !write_outbound(sink, item, write_wait, errors).await {
            return;
        }
        drained += 1;
    }

    send_close(sink, write_wait).await;
    tracing::debug!(drained, "Outbound pump stopped");
}

async fn send_close<S: WireSink>(sink: &mut S, write_wait: Duration) {
    let close = Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    }));
    if let Err(e) = write_message(sink, close, write_wait).await {
        tracing::debug!(error = %e, "Close frame not delivered");
    }
}

/// Resolve once the close flag is raised or its sender is gone
pub(crate) async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Outbound pump: queue -> socket, plus keepalive pings
///
/// Stops when the owner closes the queue or when `read_done` resolves.
pub(crate) async fn run_outbound<S: WireSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Outbound>,
    mut closed: watch::Receiver<bool>,
    mut read_done: oneshot::Receiver<()>,
    errors: mpsc::Sender<TransportError>,
    config: TransportConfig,
) {
    let period = config.ping_period().max(Duration::from_millis(1));
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Owner closed the queue (or dropped the transport)
            () = wait_closed(&mut closed) => {
                shutdown_outbound(&mut sink, &mut rx, config.write_wait, &errors).await;
                return;
            }
            // Fires on send, and on drop when the inbound task is aborted
            _ = &mut read_done => {
                rx.close();
                tracing::debug!("Read side ended, releasing connection");
                send_close(&mut sink, config.write_wait).await;
                return;
            }
            item = rx.recv() => {
                let Some(item) = item else {
                    shutdown_outbound(&mut sink, &mut rx, config.write_wait, &errors).await;
                    return;
                };
                tracing::trace!(kind = ?item.frame.kind, len = item.frame.len(), "Writing frame");
                if !write_outbound(&mut sink, item, config.write_wait, &errors).await {
                    return;
                }
            }
            _ = ticker.tick() => {
                let ping = Message::Ping(Vec::new());
                if let Err(e) = write_message(&mut sink, ping, config.write_wait).await {
                    tracing::warn!(error = %e, "Keepalive ping failed");
                    report(&errors, e);
                    return;
                }
                tracing::trace!("Ping sent");
            }
        }
    }
}

/// Map a read error to the error to forward, or `None` for an expected closure
pub(crate) fn classify_read_error(err: WsError) -> Option<TransportError> {
    match err {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => None,
        WsError::Io(ref io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::ConnectionReset
            ) =>
        {
            None
        }
        WsError::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            Some(TransportError::MessageTooLarge {
                size,
                max: max_size,
            })
        }
        other => Some(TransportError::ReadFailed(other)),
    }
}

/// Map a received close frame to the error to forward, or `None` when the
/// peer is going away, finished normally, or the closure was abnormal
pub(crate) fn classify_close(close: Option<&CloseFrame<'_>>) -> Option<TransportError> {
    let close = close?;
    match close.code {
        CloseCode::Normal | CloseCode::Away | CloseCode::Abnormal | CloseCode::Status => None,
        code => Some(TransportError::UnexpectedClose {
            code: code.into(),
            reason: close.reason.to_string(),
        }),
    }
}

/// Inbound pump: socket -> inbound queue, with the pong-refreshed deadline
pub(crate) async fn run_inbound<R: WireStream>(
    mut stream: R,
    inbound: mpsc::Sender<Frame>,
    errors: mpsc::Sender<TransportError>,
    read_done: oneshot::Sender<()>,
    config: TransportConfig,
) {
    let mut deadline = Instant::now() + config.pong_wait;

    loop {
        let next = match time::timeout_at(deadline, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::warn!(pong_wait = ?config.pong_wait, "Read deadline expired");
                report(&errors, TransportError::ReadTimeout(config.pong_wait));
                break;
            }
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                match classify_read_error(e) {
                    Some(err) => {
                        tracing::warn!(error = %err, "Unexpected read failure");
                        report(&errors, err);
                    }
                    None => tracing::debug!("Connection closed during teardown"),
                }
                break;
            }
            None => {
                tracing::debug!("Inbound stream ended");
                break;
            }
        };

        match message {
            Message::Pong(_) => {
                deadline = Instant::now() + config.pong_wait;
                tracing::trace!("Pong received, read deadline refreshed");
            }
            // Answered by the socket library
            Message::Ping(_) => {}
            Message::Close(close) => {
                if let Some(err) = classify_close(close.as_ref()) {
                    tracing::warn!(error = %err, "Peer closed unexpectedly");
                    report(&errors, err);
                } else {
                    tracing::debug!("Peer closed the connection");
                }
                break;
            }
            data => {
                let frame = Frame::from(data);
                if frame.len() > config.max_message_size {
                    report(
                        &errors,
                        TransportError::MessageTooLarge {
                            size: frame.len(),
                            max: config.max_message_size,
                        },
                    );
                    break;
                }
                tracing::trace!(kind = ?frame.kind, len = frame.len(), "Frame received");
                if inbound.send(frame).await.is_err() {
                    tracing::debug!("Inbound receiver dropped");
                    break;
                }
            }
        }
    }

    drop(stream);
    let _ = read_done.send(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_read_errors_are_suppressed() {
        assert!(classify_read_error(WsError::ConnectionClosed).is_none());
        assert!(classify_read_error(WsError::AlreadyClosed).is_none());
        assert!(classify_read_error(WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        ))
        .is_none());
        assert!(classify_read_error(WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset"
        )))
        .is_none());
    }

    #[test]
    fn test_unexpected_read_errors_are_forwarded() {
        let err = classify_read_error(WsError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )))
        .unwrap();
        assert!(err.is_unexpected_closure());

        let err = classify_read_error(WsError::Capacity(CapacityError::MessageTooLong {
            size: 4096,
            max_size: 1024,
        }))
        .unwrap();
        assert!(matches!(
            err,
            TransportError::MessageTooLarge {
                size: 4096,
                max: 1024
            }
        ));
    }

    #[test]
    fn test_close_code_classification() {
        let away = CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        };
        assert!(classify_close(Some(&away)).is_none());
        assert!(classify_close(None).is_none());

        let policy = CloseFrame {
            code: CloseCode::Policy,
            reason: "quota".into(),
        };
        match classify_close(Some(&policy)) {
            Some(TransportError::UnexpectedClose { code, reason }) => {
                assert_eq!(code, 1008);
                assert_eq!(reason, "quota");
            }
            other => panic!("expected unexpected close, got {other:?}"),
        }
    }
}
