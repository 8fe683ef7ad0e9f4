use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::dispatcher::{ConnectionId, Dispatcher};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve one `/ws` client until it disconnects or stops answering pings.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = dispatcher.connect().await;
    let conn_id = subscription.id();
    info!(
        "Connection {} opened ({} live)",
        conn_id,
        dispatcher.connection_count().await
    );

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward fan-out frames -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = subscription.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read frames from client and relay them
    let relay_dispatcher = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => relay_text(&relay_dispatcher, conn_id, text.as_str()),
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Some(info) = dispatcher.disconnect(conn_id).await {
        let lifetime = Utc::now() - info.connected_at;
        info!(
            "Connection {} closed after {}s",
            conn_id,
            lifetime.num_seconds()
        );
    }
}

/// Relay a client text frame if it is JSON. Malformed frames are logged and
/// dropped; the connection stays open.
fn relay_text(dispatcher: &Dispatcher, conn_id: ConnectionId, text: &str) {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(_) => {
            debug!("Connection {} relaying {} bytes", conn_id, text.len());
            dispatcher.relay(conn_id, text);
        }
        Err(e) => {
            let preview: String = text.chars().take(200).collect();
            warn!(
                "Connection {} sent malformed JSON: {} -- raw: {}",
                conn_id, e, preview
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_frames_are_not_relayed() {
        let dispatcher = Dispatcher::new();
        let sender = dispatcher.connect().await;
        let mut listener = dispatcher.connect().await;

        relay_text(&dispatcher, sender.id(), "{not json");
        relay_text(&dispatcher, sender.id(), r#"{"type":"ping"}"#);

        let frame = tokio::time::timeout(Duration::from_millis(50), listener.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&*frame, r#"{"type":"ping"}"#);
    }
}
