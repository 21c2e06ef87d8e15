use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Fan-out of JSON events to every open stream connection.
///
/// Connections are kept in memory only: there is no replay for late
/// subscribers and a restart drops everyone. Channels are unbounded, so a
/// slow client grows its own queue rather than holding up the others.
#[derive(Default)]
pub struct NotificationHub {
    connections: DashMap<Uuid, mpsc::UnboundedSender<String>>,
}

/// Keeps a connection registered; dropping it (client went away) unregisters.
pub struct Subscription {
    id: Uuid,
    hub: Arc<NotificationHub>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.connections.remove(&self.id);
        tracing::debug!(connection = %self.id, "Notification stream closed");
    }
}

/// Builds `{ "type": kind, "timestamp": now, ...fields }`.
pub fn event(kind: &str, fields: Value) -> Value {
    let mut event = json!({
        "type": kind,
        "timestamp": chrono::Utc::now().timestamp(),
    });
    if let (Some(target), Value::Object(extra)) = (event.as_object_mut(), fields) {
        for (key, value) in extra {
            if key != "type" && key != "timestamp" {
                target.insert(key, value);
            }
        }
    }
    event
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(self: &Arc<Self>) -> (Subscription, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections.insert(id, tx);
        tracing::debug!(connection = %id, open = self.connections.len(), "Notification stream opened");
        (Subscription { id, hub: Arc::clone(self) }, rx)
    }

    /// Sends the value to all open connections and returns how many got it.
    pub fn broadcast(&self, payload: &Value) -> usize {
        let data = payload.to_string();
        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.connections.iter() {
            if entry.value().send(data.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        // removal has to wait until the iterator has released its shard locks
        for id in closed {
            self.connections.remove(&id);
        }
        delivered
    }

    pub fn notify(&self, kind: &str, fields: Value) -> usize {
        let delivered = self.broadcast(&event(kind, fields));
        tracing::debug!(kind, delivered, "Broadcast notification");
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_open_connection() {
        let hub = Arc::new(NotificationHub::new());
        let (_first, mut first_rx) = hub.subscribe();
        let (_second, mut second_rx) = hub.subscribe();

        let delivered = hub.broadcast(&json!({"type": "ping"}));

        assert_eq!(delivered, 2);
        assert_eq!(first_rx.recv().await.unwrap(), r#"{"type":"ping"}"#);
        assert_eq!(second_rx.recv().await.unwrap(), r#"{"type":"ping"}"#);
    }

    #[tokio::test]
    async fn dropping_the_subscription_unregisters_it() {
        let hub = Arc::new(NotificationHub::new());
        let (subscription, _rx) = hub.subscribe();
        assert_eq!(hub.connection_count(), 1);

        drop(subscription);

        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.broadcast(&json!({})), 0);
    }

    #[tokio::test]
    async fn closed_receivers_are_pruned_on_broadcast() {
        let hub = Arc::new(NotificationHub::new());
        let (_kept, rx) = hub.subscribe();
        drop(rx);

        assert_eq!(hub.broadcast(&json!({"type": "x"})), 0);
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn event_keeps_its_own_type_and_timestamp() {
        let built = event("sync_completed", json!({"type": "spoofed", "agentId": 3}));
        assert_eq!(built["type"], "sync_completed");
        assert_eq!(built["agentId"], 3);
        assert!(built["timestamp"].is_i64());
    }
}
