//! Read and write loops for a single connection.
//!
//! Each connection runs exactly one of each. The read loop is the only
//! reader of the transport and the only task that unregisters the
//! connection; the write loop is the only writer and owns the keepalive
//! timer. When either loop ends it tells the other, so a failure on one side
//! always tears down the whole connection.

use super::{client::DisconnectReason, Connection, ConnectionId};
use crate::messaging::{Envelope, MessageHandler};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, trace, warn};

/// Separator between messages coalesced into one frame.
const MESSAGE_DELIMITER: char = '\n';

/// Why a transport write did not complete.
#[derive(Debug, thiserror::Error)]
pub enum WriteFailure {
    #[error("transport write failed: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("write deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Unregisters the connection and wakes the write loop when the read loop
/// ends, including when a handler panics and the task unwinds.
struct ReaderTeardown {
    connection: Arc<Connection>,
    reader_done: Option<oneshot::Sender<()>>,
}

impl Drop for ReaderTeardown {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("💥 Read loop for connection {} panicked", self.connection.id());
        }

        self.connection.request_unregister();
        if let Some(reader_done) = self.reader_done.take() {
            let _ = reader_done.send(());
        }
    }
}

/// Reads frames until the transport fails or the peer closes, dispatching
/// every decodable envelope to `handler`.
///
/// Malformed frames are logged and dropped; they never end the loop. On
/// exit the connection is handed to the gateway's unregister intake and the
/// write loop is told to close the transport. This also happens if the
/// handler panics.
///
/// # Arguments
///
/// * `connection` - The connection whose inbound side this loop serves
/// * `stream` - Read half of the upgraded WebSocket
/// * `handler` - Application logic invoked for every decoded envelope
/// * `reader_done` - Fired when this loop ends, stopping the write loop
/// * `writer_done` - Fired by the write loop when it ends
pub async fn read_loop<S>(
    connection: Arc<Connection>,
    mut stream: SplitStream<WebSocketStream<S>>,
    handler: Arc<dyn MessageHandler>,
    reader_done: oneshot::Sender<()>,
    mut writer_done: oneshot::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let connection_id = connection.id();
    let teardown = ReaderTeardown {
        connection: connection.clone(),
        reader_done: Some(reader_done),
    };

    let reason = loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = &mut writer_done => break DisconnectReason::ServerClosed,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                dispatch(&connection, handler.as_ref(), text.as_str()).await;
            }
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => dispatch(&connection, handler.as_ref(), text).await,
                Err(e) => warn!("⚠️ Dropping non UTF-8 frame from connection {}: {}", connection_id, e),
            },
            Some(Ok(Message::Close(frame))) => {
                break DisconnectReason::from_close_frame(frame.as_ref());
            }
            // Pongs are answered by the protocol layer; nothing to do here.
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Err(e)) => break DisconnectReason::from_error(&e),
            None => break DisconnectReason::Abnormal,
        }
    };

    if reason.is_unexpected() {
        warn!("🔌 Connection {} closed unexpectedly: {}", connection_id, reason);
    } else {
        debug!("🔌 Connection {} read loop finished: {}", connection_id, reason);
    }

    drop(teardown);
    // Dropping the read half here releases our side of the transport.
}

/// Decodes one frame and hands it to the handler. Errors stay contained.
async fn dispatch(connection: &Arc<Connection>, handler: &dyn MessageHandler, text: &str) {
    let envelope = match Envelope::decode(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("⚠️ Dropping malformed message from connection {}: {}", connection.id(), e);
            return;
        }
    };

    trace!("📨 Connection {} sent {} event", connection.id(), envelope.event);

    let event = envelope.event;
    if let Err(e) = handler.handle(connection, envelope).await {
        warn!("❌ Handler failed for {} from connection {}: {}", event, connection.id(), e);
    }
}

/// Drains the outbound queue onto the transport and keeps the link alive.
///
/// Messages already waiting when the loop wakes are coalesced into a single
/// text frame separated by newlines. A closed queue produces a close frame
/// and a clean exit; any failed or late write ends the loop immediately.
pub async fn write_loop<S>(
    connection_id: ConnectionId,
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::Receiver<String>,
    mut reader_done: oneshot::Receiver<()>,
    writer_done: oneshot::Sender<()>,
    keepalive: Duration,
    write_timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result: Result<(), WriteFailure> = loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(first) => {
                    let batch = coalesce(first, &mut outbound);
                    if let Err(e) = send_with_deadline(&mut sink, Message::Text(batch.into()), write_timeout).await {
                        break Err(e);
                    }
                }
                None => {
                    debug!("📪 Outbound queue for connection {} closed, sending close frame", connection_id);
                    if let Err(e) = send_with_deadline(&mut sink, Message::Close(None), write_timeout).await {
                        trace!("Close frame for connection {} not delivered: {}", connection_id, e);
                    }
                    break Ok(());
                }
            },
            _ = ticker.tick() => {
                trace!("🏓 Keepalive ping to connection {}", connection_id);
                if let Err(e) = send_with_deadline(&mut sink, Message::Ping(Vec::new().into()), write_timeout).await {
                    break Err(e);
                }
            }
            _ = &mut reader_done => break Ok(()),
        }
    };

    if let Err(e) = &result {
        info!("❌ Connection {} write loop failed: {}", connection_id, e);
    }

    drop(ticker);
    let _ = writer_done.send(());
    let _ = timeout(write_timeout, sink.close()).await;
}

/// Appends everything that was already queued at this instant to `first`.
///
/// The count is taken once; messages arriving while the batch is built wait
/// for the next wake.
fn coalesce(first: String, outbound: &mut mpsc::Receiver<String>) -> String {
    let pending = outbound.len();
    let mut batch = first;
    for _ in 0..pending {
        match outbound.try_recv() {
            Ok(next) => {
                batch.push(MESSAGE_DELIMITER);
                batch.push_str(&next);
            }
            Err(_) => break,
        }
    }
    batch
}

async fn send_with_deadline<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    message: Message,
    deadline: Duration,
) -> Result<(), WriteFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(WriteFailure::DeadlineExceeded(deadline)),
    }
}
