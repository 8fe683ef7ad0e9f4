use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};
use uuid::Uuid;

use huddle_types::events::GatewayEvent;

pub type ConnectionId = Uuid;

/// Capacity of the fan-out ring. Slow receivers lag and lose frames.
const BROADCAST_CAPACITY: usize = 1024;

/// One serialized JSON frame on its way to clients.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Connection that produced the frame; `None` for server events.
    pub origin: Option<ConnectionId>,
    pub json: Arc<str>,
}

/// Live connection bookkeeping.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub connected_at: DateTime<Utc>,
}

/// Connection manager: tracks live clients and fans frames out to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connected client receives every frame
    broadcast_tx: broadcast::Sender<Frame>,

    /// Live connections: conn_id -> info
    connections: RwLock<HashMap<ConnectionId, ConnectionInfo>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection and subscribe it to the fan-out.
    pub async fn connect(&self) -> Subscription {
        let id = Uuid::new_v4();
        let rx = self.inner.broadcast_tx.subscribe();
        self.inner.connections.write().await.insert(
            id,
            ConnectionInfo {
                id,
                connected_at: Utc::now(),
            },
        );
        Subscription { id, rx }
    }

    /// Forget a connection. Returns its info if it was still registered.
    pub async fn disconnect(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.inner.connections.write().await.remove(&id)
    }

    /// Relay a client frame to every other connection.
    pub fn relay(&self, from: ConnectionId, raw: &str) {
        self.send(Frame {
            origin: Some(from),
            json: Arc::from(raw),
        });
    }

    /// Push a server event to every connection.
    pub fn broadcast(&self, event: &GatewayEvent) {
        match serde_json::to_string(event) {
            Ok(json) => self.send(Frame {
                origin: None,
                json: Arc::from(json),
            }),
            Err(e) => warn!("Failed to serialize gateway event: {}", e),
        }
    }

    fn send(&self, frame: Frame) {
        // No receivers is fine: nobody is listening right now.
        if let Ok(n) = self.inner.broadcast_tx.send(frame) {
            debug!("Frame fanned out to {} receivers", n);
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

/// A connection's view of the fan-out: skips frames it produced itself.
pub struct Subscription {
    id: ConnectionId,
    rx: broadcast::Receiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next frame for this connection. `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        loop {
            match self.rx.recv().await {
                Ok(frame) if frame.origin == Some(self.id) => continue,
                Ok(frame) => return Some(frame.json),
                Err(RecvError::Lagged(n)) => {
                    warn!("Connection {} lagged by {} frames", self.id, n);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use huddle_types::models::{Message, MessageType};

    async fn try_recv(sub: &mut Subscription) -> Option<Arc<str>> {
        tokio::time::timeout(Duration::from_millis(50), sub.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn relay_reaches_everyone_but_the_sender() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.connect().await;
        let mut b = dispatcher.connect().await;
        let mut c = dispatcher.connect().await;
        assert_eq!(dispatcher.connection_count().await, 3);

        dispatcher.relay(a.id(), r#"{"hello":"world"}"#);

        assert_eq!(try_recv(&mut b).await.as_deref(), Some(r#"{"hello":"world"}"#));
        assert_eq!(try_recv(&mut c).await.as_deref(), Some(r#"{"hello":"world"}"#));
        assert!(try_recv(&mut a).await.is_none());
    }

    #[tokio::test]
    async fn server_events_reach_everyone() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.connect().await;
        let mut b = dispatcher.connect().await;

        dispatcher.broadcast(&GatewayEvent::MessageCreated {
            message: Message {
                id: 7,
                sender_id: 3,
                receiver_id: 2,
                company_id: 1,
                message_type: MessageType::Text,
                content: "hello".into(),
                is_read: false,
                created_at: Utc::now(),
            },
        });

        for sub in [&mut a, &mut b] {
            let frame = try_recv(sub).await.unwrap();
            let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(json["type"], "message_created");
            assert_eq!(json["data"]["message"]["id"], 7);
        }
    }

    #[tokio::test]
    async fn disconnect_removes_connection() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.connect().await;
        let _b = dispatcher.connect().await;

        assert!(dispatcher.disconnect(a.id()).await.is_some());
        assert!(dispatcher.disconnect(a.id()).await.is_none());
        assert_eq!(dispatcher.connection_count().await, 1);
    }

    #[tokio::test]
    async fn relay_without_listeners_is_harmless() {
        let dispatcher = Dispatcher::new();
        dispatcher.relay(Uuid::new_v4(), "{}");
        assert_eq!(dispatcher.connection_count().await, 0);
    }
}
