use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events published by the consumer pool onto the `events` bus. Loss is
/// acceptable — publishers must never block fetch progress on a publish
/// failure, so [`EventBus::publish`] ignores the "no subscribers" error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    Connected,
    Heartbeat,
    FetchStatus {
        feed_id: Uuid,
        status: String,
        message: Option<String>,
    },
    NewItems {
        feed_id: Uuid,
        count: usize,
    },
}

impl Event {
    fn type_name(&self) -> &'static str {
        match self {
            Event::Connected => "connected",
            Event::Heartbeat => "heartbeat",
            Event::FetchStatus { .. } => "fetch_status",
            Event::NewItems { .. } => "new_items",
        }
    }
}

/// The stable wire encoding for the `events` channel: `{type, timestamp,
/// data}`. `timestamp` is always RFC 3339 UTC — see SPEC_FULL.md §9 for why
/// this is the one place the encoding is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub type_name: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    fn from_event(event: Event, timestamp: DateTime<Utc>) -> Self {
        let type_name = event.type_name().to_string();
        let data = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
        // The tagged enum serializes its own `kind` field into `data`;
        // callers only care about the envelope's `type`, so drop it here.
        let data = match data {
            serde_json::Value::Object(mut map) => {
                map.remove("kind");
                serde_json::Value::Object(map)
            }
            other => other,
        };
        Self {
            type_name,
            timestamp,
            data,
        }
    }
}

/// Fire-and-forget pub/sub channel. Bounded so a lagging subscriber can't
/// pin memory; lag is observed as dropped events, which matches "loss is
/// acceptable" in §4.2.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Publish an event. Best-effort: a send failure (no subscribers)
    /// is not an error from the caller's point of view.
    pub fn publish(&self, event: Event) {
        let envelope = EventEnvelope::from_event(event, Utc::now());
        let _ = self.tx.send(envelope);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
