use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Per-stream channel capacity.
const HUB_CAPACITY: usize = 16;

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

/// Registry of SSE hubs, one per event so streams never leak across events.
#[derive(Default)]
pub struct EventChannels {
    hubs: DashMap<Uuid, Arc<SseHub>>,
}

impl EventChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub for the given event, created lazily on first use.
    pub fn hub_for(&self, event_id: Uuid) -> Arc<SseHub> {
        self.hubs
            .entry(event_id)
            .or_insert_with(|| Arc::new(SseHub::new(HUB_CAPACITY)))
            .clone()
    }

    /// Send the same payload to every live hub.
    pub fn broadcast_all(&self, event: ServerEvent) {
        for hub in self.hubs.iter() {
            hub.broadcast(event.clone());
        }
    }
}
