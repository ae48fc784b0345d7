//! In-process update bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans every [`UpdateEvent`] out to all current subscribers.
//! Delivery is best-effort: nothing is persisted or replayed, and a
//! subscriber that falls behind observes `RecvError::Lagged`. Share it via
//! `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// UpdateEvent
// ---------------------------------------------------------------------------

/// A state change announced on one of the update channels.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    /// Channel name, e.g. `"queueUpdate"`.
    pub channel: String,

    /// Event type within the channel, e.g. `"added"`.
    pub kind: String,

    /// Event-specific fields, flattened next to `type` on the wire.
    pub data: Map<String, Value>,

    pub timestamp: DateTime<Utc>,
}

impl UpdateEvent {
    pub fn new(channel: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            kind: kind.into(),
            data: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a field. Values that fail to serialize become `null`.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.to_string(), value);
        self
    }

    /// Wire form sent to push subscribers:
    /// `{"event": <channel>, "data": {"type": <kind>, ...}}`.
    pub fn to_message(&self) -> Value {
        let mut data = self.data.clone();
        data.insert("type".to_string(), Value::String(self.kind.clone()));
        serde_json::json!({
            "event": self.channel,
            "data": data,
        })
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// ```rust
/// use clipcraftr_events::bus::{EventBus, UpdateEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(UpdateEvent::new("queueUpdate", "status"));
/// assert_eq!(rx.try_recv().unwrap().kind, "status");
/// ```
pub struct EventBus {
    sender: broadcast::Sender<UpdateEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity. When the buffer is
    /// full the oldest unconsumed events are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. No-op without any.
    pub fn publish(&self, event: UpdateEvent) {
        tracing::trace!(channel = %event.channel, kind = %event.kind, "Publishing update");
        // A send error only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Publish `kind` on `channel` with the fields of `data` (an object;
    /// other values are ignored).
    pub fn emit(&self, channel: &str, kind: &str, data: Value) {
        let mut event = UpdateEvent::new(channel, kind);
        if let Value::Object(fields) = data {
            event.data = fields;
        }
        self.publish(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
