//! Duplex WebSocket Transport
//!
//! Owns one persistent connection and the two pumps that drive it.
//!
//! # Channels
//!
//! ```text
//!   send() ──► outbound queue (100) ──► outbound pump ──► socket
//!                                          │ ping every 80% of pong_wait
//!   socket ──► inbound pump ──► inbound queue (100) ──► results().0
//!                  │ read deadline refreshed by pongs
//!                  └────────────► error slot (1) ────► results().1
//! ```
//!
//! When the inbound pump stops (deadline, peer close, read failure) the
//! outbound pump follows: it sends a close frame and drops the write half.
//! Later sends fail with [`TransportError::ChannelClosed`].
//!
//! Closing is a single, consuming operation: [`DuplexTransport::close`] raises
//! the close flag seen by every [`OutboundSender`], lets the outbound pump
//! drain and send a close frame, and stops the inbound pump. Sends that are
//! pending or attempted afterwards fail with [`TransportError::ChannelClosed`].

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use super::config::TransportConfig;
use super::frame::Frame;
use super::pumps::{run_inbound, run_outbound, wait_closed, Outbound};
use super::traits::{TransportError, WireSink, WireStream};

/// Cloneable handle onto the outbound queue
///
/// Every handle observes the transport's close: once closed, pending and
/// future sends return [`TransportError::ChannelClosed`].
#[derive(Clone, Debug)]
pub struct OutboundSender {
    tx: mpsc::Sender<Outbound>,
    closed: watch::Receiver<bool>,
}

impl OutboundSender {
    /// Enqueue a frame for the outbound pump
    ///
    /// Waits only while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ChannelClosed` if the queue is closed before
    /// or while waiting for capacity.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.enqueue(Outbound { frame, ack: None }).await
    }

    /// Enqueue a frame and wait until the outbound pump has written it
    ///
    /// # Errors
    ///
    /// Returns the write error for this frame, or
    /// `TransportError::ChannelClosed` if the pump stopped before writing it.
    pub async fn send_confirmed(&self, frame: Frame) -> Result<(), TransportError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.enqueue(Outbound {
            frame,
            ack: Some(ack_tx),
        })
        .await?;
        ack_rx.await.map_err(|_| TransportError::ChannelClosed)?
    }

    /// Enqueue raw bytes as a binary frame
    ///
    /// # Errors
    ///
    /// See [`OutboundSender::send`].
    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.send(Frame::binary(data)).await
    }

    /// Check whether the outbound queue has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.tx.is_closed()
    }

    async fn enqueue(&self, item: Outbound) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ChannelClosed);
        }

        let mut closed = self.closed.clone();
        tokio::select! {
            sent = self.tx.send(item) => sent.map_err(|_| TransportError::ChannelClosed),
            () = wait_closed(&mut closed) => Err(TransportError::ChannelClosed),
        }
    }
}

/// Persistent duplex connection with bounded queues and keepalive
pub struct DuplexTransport {
    outbound: OutboundSender,
    close_tx: watch::Sender<bool>,
    inbound_rx: Option<mpsc::Receiver<Frame>>,
    error_rx: Option<mpsc::Receiver<TransportError>>,
    outbound_task: JoinHandle<()>,
    inbound_task: JoinHandle<()>,
    config: TransportConfig,
}

impl std::fmt::Debug for DuplexTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexTransport")
            .field("closed", &self.outbound.is_closed())
            .field("results_taken", &self.inbound_rx.is_none())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DuplexTransport {
    /// Dial a WebSocket URL and start the pumps
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` target
    /// * `headers` - Extra handshake headers (e.g. `Authorization`)
    /// * `config` - Deadlines, size limit and queue capacities
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` for a malformed URL or header,
    /// `TransportError::ConnectTimeout` if the handshake does not finish in
    /// time, and `TransportError::ConnectionFailed` if it fails.
    pub async fn connect<I, K, V>(
        url: &str,
        headers: I,
        config: TransportConfig,
    ) -> Result<Self, TransportError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(format!("{url}: {e}")))?;

        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_ref().as_bytes()).map_err(|e| {
                TransportError::InvalidRequest(format!("header {:?}: {e}", name.as_ref()))
            })?;
            let value = HeaderValue::from_str(value.as_ref())
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);
        ws_config.max_frame_size = Some(config.max_message_size);

        let handshake =
            tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false);
        let (socket, response) = tokio::time::timeout(config.connect_timeout, handshake)
            .await
            .map_err(|_| TransportError::ConnectTimeout(config.connect_timeout))?
            .map_err(|source| TransportError::ConnectionFailed {
                url: url.to_string(),
                source,
            })?;

        tracing::info!(url, status = %response.status(), "WebSocket connected");

        let (sink, stream) = socket.split();
        Ok(Self::from_parts(sink, stream, config))
    }

    /// Build a transport over an already-established connection
    ///
    /// Spawns the pumps on the current tokio runtime.
    pub fn from_parts<S, R>(sink: S, stream: R, config: TransportConfig) -> Self
    where
        S: WireSink,
        R: WireStream,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (error_tx, error_rx) = mpsc::channel(config.error_capacity.max(1));
        let (close_tx, close_rx) = watch::channel(false);
        let (read_done_tx, read_done_rx) = oneshot::channel();

        let outbound_task = tokio::spawn(run_outbound(
            sink,
            outbound_rx,
            close_rx.clone(),
            read_done_rx,
            error_tx.clone(),
            config.clone(),
        ));
        let inbound_task = tokio::spawn(run_inbound(
            stream,
            inbound_tx,
            error_tx,
            read_done_tx,
            config.clone(),
        ));

        Self {
            outbound: OutboundSender {
                tx: outbound_tx,
                closed: close_rx,
            },
            close_tx,
            inbound_rx: Some(inbound_rx),
            error_rx: Some(error_rx),
            outbound_task,
            inbound_task,
            config,
        }
    }

    /// Get the transport configuration
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Get a cloneable handle onto the outbound queue
    #[must_use]
    pub fn sender(&self) -> OutboundSender {
        self.outbound.clone()
    }

    /// Enqueue a frame for the outbound pump
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ChannelClosed` once the queue is closed.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound.send(frame).await
    }

    /// Enqueue a frame and wait for its write result
    ///
    /// # Errors
    ///
    /// Returns the write error, or `TransportError::ChannelClosed`.
    pub async fn send_confirmed(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound.send_confirmed(frame).await
    }

    /// Enqueue raw bytes as a binary frame
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ChannelClosed` once the queue is closed.
    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.outbound.send_binary(data).await
    }

    /// Take the inbound and error receivers
    ///
    /// The receivers are handed out once; both end when the transport closes.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidState` if they were already taken.
    pub fn results(
        &mut self,
    ) -> Result<(mpsc::Receiver<Frame>, mpsc::Receiver<TransportError>), TransportError> {
        match (self.inbound_rx.take(), self.error_rx.take()) {
            (Some(inbound), Some(errors)) => Ok((inbound, errors)),
            _ => Err(TransportError::InvalidState(
                "Results already taken".to_string(),
            )),
        }
    }

    /// Close the outbound queue, stop both pumps and release the connection
    ///
    /// The outbound pump drains frames already queued and sends a close frame,
    /// bounded by the write deadline. Consumes the transport, so it runs once.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidState` if the outbound pump panicked.
    pub async fn close(self) -> Result<(), TransportError> {
        let Self {
            outbound,
            close_tx,
            inbound_rx,
            error_rx,
            mut outbound_task,
            inbound_task,
            config,
        } = self;

        close_tx.send_replace(true);
        drop(outbound);

        let joined = tokio::time::timeout(config.write_wait, &mut outbound_task).await;
        inbound_task.abort();
        drop(inbound_rx);
        drop(error_rx);

        match joined {
            Ok(Ok(())) => {
                tracing::debug!("Transport closed");
                Ok(())
            }
            Ok(Err(e)) if e.is_panic() => Err(TransportError::InvalidState(format!(
                "outbound pump panicked: {e}"
            ))),
            Ok(Err(_)) => Ok(()),
            Err(_) => {
                tracing::warn!(
                    write_wait = ?config.write_wait,
                    "Outbound pump did not stop in time"
                );
                outbound_task.abort();
                Ok(())
            }
        }
    }
}
