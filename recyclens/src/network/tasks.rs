/// Async tasks for sending and receiving WebSocket messages
///
/// The sender drains the outbound channel into the socket; the receiver
/// turns socket frames into `TransportEvent`s and always finishes with
/// exactly one terminal event.

use crate::network::connection::{WsReader, WsWriter};
use crate::network::error::{NetworkError, NetworkResult};
use crate::network::messages::{ClientMessage, ServerMessage};
use crate::network::transport::TransportEvent;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// How long the sender waits for the close handshake once its channel closes
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Sender task that forwards client messages to the WebSocket
///
/// Runs until the channel closes (every sender dropped), then sends a
/// close frame.
///
/// # Errors
/// Returns an error if serialization or a socket write fails.
pub async fn sender_task(
    mut ws_writer: WsWriter,
    mut message_rx: mpsc::Receiver<ClientMessage>,
) -> NetworkResult<()> {
    info!("Sender task started");

    let mut message_count = 0u64;

    while let Some(message) = message_rx.recv().await {
        message_count += 1;

        let json = serde_json::to_string(&message).map_err(NetworkError::SerializationError)?;
        debug!(
            "Sending {} #{} ({} bytes)",
            message.kind(),
            message_count,
            json.len()
        );

        ws_writer
            .send(Message::Text(json.into()))
            .await
            .map_err(NetworkError::WebSocketError)?;
    }

    info!(
        "Sender task completed: {} messages sent, channel closed",
        message_count
    );

    match tokio::time::timeout(CLOSE_TIMEOUT, ws_writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to close WebSocket writer: {}", e),
        Err(_) => warn!("Timed out closing WebSocket writer"),
    }

    Ok(())
}

/// Receiver task that parses server frames and forwards them as events
///
/// JSON may arrive in text or binary frames. A frame that does not parse
/// is logged and skipped. The task ends after sending `Closed` (normal
/// close or end of stream) or `Failed` (socket error or abnormal close
/// code), or when the event receiver is dropped.
pub async fn receiver_task(mut ws_reader: WsReader, event_tx: mpsc::Sender<TransportEvent>) {
    info!("Receiver task started");

    let mut message_count = 0u64;

    let terminal = loop {
        let Some(frame) = ws_reader.next().await else {
            info!("WebSocket stream ended");
            break TransportEvent::Closed;
        };

        let payload = match frame {
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(frame)) => {
                info!("Received close frame: {:?}", frame);
                break match frame {
                    Some(frame) if !is_clean_close(frame.code) => TransportEvent::Failed(format!(
                        "closed with code {}: {}",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    )),
                    _ => TransportEvent::Closed,
                };
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by the underlying library
                debug!("Received ping, length: {} bytes", data.len());
                continue;
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong");
                continue;
            }
            Ok(Message::Frame(_)) => {
                debug!("Received raw frame");
                continue;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break TransportEvent::Failed(e.to_string());
            }
        };

        match parse_server_message(&payload) {
            Ok(message) => {
                message_count += 1;
                if event_tx.send(TransportEvent::Message(message)).await.is_err() {
                    debug!("Event receiver dropped, stopping receiver task");
                    return;
                }
            }
            Err(e) => warn!("Skipping unparseable server frame ({} bytes): {}", payload.len(), e),
        }
    };

    info!(
        "Receiver task completed: {} messages received, terminal event {:?}",
        message_count, terminal
    );

    let _ = event_tx.send(terminal).await;
}

/// Parse one server frame
pub fn parse_server_message(payload: &[u8]) -> NetworkResult<ServerMessage> {
    Ok(serde_json::from_slice(payload)?)
}

fn is_clean_close(code: CloseCode) -> bool {
    matches!(code, CloseCode::Normal | CloseCode::Away)
}
