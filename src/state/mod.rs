//! Shared application state: storage handle, SSE hubs, clock, and degraded flag.

pub mod clock;
mod sse;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::event_store::EventStore, error::ServiceError};

pub use self::sse::{EventChannels, SseHub};

pub type SharedState = Arc<AppState>;

/// Central application state storing the storage handle, SSE channels, and
/// runtime configuration.
pub struct AppState {
    event_store: RwLock<Option<Arc<dyn EventStore>>>,
    channels: EventChannels,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            event_store: RwLock::new(None),
            channels: EventChannels::new(),
            degraded: degraded_tx,
            config,
        })
    }

    /// Obtain a handle to the current event store, if one is installed.
    pub async fn event_store(&self) -> Option<Arc<dyn EventStore>> {
        let guard = self.event_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the event store or fail with the degraded-mode error.
    pub async fn require_event_store(&self) -> Result<Arc<dyn EventStore>, ServiceError> {
        self.event_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new event store implementation and leave degraded mode.
    pub async fn install_event_store(&self, store: Arc<dyn EventStore>) {
        {
            let mut guard = self.event_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current event store and enter degraded mode.
    pub async fn clear_event_store(&self) {
        {
            let mut guard = self.event_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.event_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Per-event SSE hub registry.
    pub fn channels(&self) -> &EventChannels {
        &self.channels
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current != value {
                *current = value;
                true
            } else {
                false
            }
        });
    }
}
