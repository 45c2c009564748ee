use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{event_store::EventStore, storage::StorageError},
    services::sse_events,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded
/// mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn EventStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_event_store(store.clone()).await;
                sse_events::broadcast_system_status(&state, false);
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "storage health check failed");

                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "storage reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "storage reconnect first attempt failed; entering degraded mode"
                                            );
                                            state.clear_event_store().await;
                                            sse_events::broadcast_system_status(&state, true);
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        }
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                state.install_event_store(store.clone()).await;
                                sse_events::broadcast_system_status(&state, false);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}
