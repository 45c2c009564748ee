//! Client-side timer synchronization.
//!
//! Displays tick locally every second while a slow loop polls the server for
//! the authoritative reading. Each poll measures the round trip, attributes
//! half of it to network latency, and keeps a local-minus-server clock offset
//! so extrapolated readings stay honest on skewed clients. A tick that jumps
//! more than the drift threshold, or that hits zero while the event still
//! looks running, forces an immediate resync instead of waiting for the next
//! poll.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use futures::future::BoxFuture;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::{
    sync::{Notify, watch},
    task::JoinHandle,
    time::sleep,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::EventStatus,
    dto::{timer::TimerSyncResponse, unix_millis},
    state::clock::{self, TimerReading},
};

/// Error surfaced by a [`TimerFeed`] poll.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The feed could not be reached or returned an unusable payload.
    #[error("timer feed unavailable: {0}")]
    Feed(String),
}

/// Source of authoritative timer readings, usually the `/timer-sync`
/// endpoint. Object-safe so tests can inject a scripted feed.
pub trait TimerFeed: Send + Sync + 'static {
    /// Fetch the current reading for `event_id`.
    fn fetch(&self, event_id: Uuid) -> BoxFuture<'static, Result<TimerSyncResponse, SyncError>>;
}

/// Cadence and drift tolerance of the sync loops.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// How often the slow loop polls the feed.
    pub sync_interval: StdDuration,
    /// How often the fast loop extrapolates locally.
    pub tick_interval: StdDuration,
    /// Tick-to-tick jump that forces an immediate resync.
    pub max_drift_seconds: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_interval: StdDuration::from_secs(10),
            tick_interval: StdDuration::from_secs(1),
            max_drift_seconds: 2,
        }
    }
}

struct Snapshot {
    response: TimerSyncResponse,
    /// Local clock minus estimated server clock, milliseconds.
    offset_ms: i64,
    last_reading: TimerReading,
}

struct SyncShared {
    event_id: Uuid,
    feed: Arc<dyn TimerFeed>,
    settings: SyncSettings,
    snapshot: Mutex<Option<Snapshot>>,
    ticks: watch::Sender<TimerReading>,
    status: watch::Sender<EventStatus>,
    resync: Notify,
}

/// Handle over the two background loops; dropping it stops both.
pub struct TimerSync {
    shared: Arc<SyncShared>,
    tasks: Vec<JoinHandle<()>>,
}

impl TimerSync {
    /// Start syncing the clock of `event_id` against `feed`.
    pub fn start(event_id: Uuid, feed: Arc<dyn TimerFeed>, settings: SyncSettings) -> Self {
        let initial = TimerReading {
            status: EventStatus::Waiting,
            elapsed_seconds: 0,
            remaining_seconds: 0,
        };
        let shared = Arc::new(SyncShared {
            event_id,
            feed,
            settings,
            snapshot: Mutex::new(None),
            ticks: watch::Sender::new(initial),
            status: watch::Sender::new(EventStatus::Waiting),
            resync: Notify::new(),
        });

        let sync_task = tokio::spawn(sync_loop(shared.clone()));
        let tick_task = tokio::spawn(tick_loop(shared.clone()));

        Self {
            shared,
            tasks: vec![sync_task, tick_task],
        }
    }

    /// Every local reading, published once per tick interval.
    pub fn ticks(&self) -> watch::Receiver<TimerReading> {
        self.shared.ticks.subscribe()
    }

    /// Lifecycle status, published only when it changes.
    pub fn status_changes(&self) -> watch::Receiver<EventStatus> {
        self.shared.status.subscribe()
    }

    /// Request an immediate poll, e.g. after a pushed status change.
    pub fn resync(&self) {
        self.shared.resync.notify_one();
    }

    /// Stop both loops.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for TimerSync {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sync_loop(shared: Arc<SyncShared>) {
    loop {
        if let Err(err) = sync_once(&shared).await {
            warn!(event_id = %shared.event_id, error = %err, "timer sync failed");
        }
        tokio::select! {
            _ = sleep(shared.settings.sync_interval) => {}
            _ = shared.resync.notified() => {}
        }
    }
}

async fn sync_once(shared: &SyncShared) -> Result<(), SyncError> {
    let requested = OffsetDateTime::now_utc();
    let response = shared.feed.fetch(shared.event_id).await?;
    let received = OffsetDateTime::now_utc();

    // Half the round trip is attributed to the response leg.
    let rtt_ms = (received - requested).whole_milliseconds() as i64;
    let estimated_server_ms = response.server_time_ms + rtt_ms / 2;
    let offset_ms = unix_millis(received) - estimated_server_ms;

    let reading = TimerReading {
        status: response.status,
        elapsed_seconds: response.elapsed_seconds,
        remaining_seconds: response.remaining_seconds,
    };

    {
        let mut guard = shared.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Snapshot {
            response,
            offset_ms,
            last_reading: reading,
        });
    }

    publish(shared, reading);
    Ok(())
}

async fn tick_loop(shared: Arc<SyncShared>) {
    loop {
        sleep(shared.settings.tick_interval).await;
        if tick(&shared) {
            shared.resync.notify_one();
        }
    }
}

/// Extrapolate one local reading; returns true when a resync is warranted.
fn tick(shared: &SyncShared) -> bool {
    let mut guard = shared.snapshot.lock().unwrap_or_else(|e| e.into_inner());
    let Some(snapshot) = guard.as_mut() else {
        // Nothing synced yet.
        return false;
    };

    if snapshot.response.status != EventStatus::Running {
        // Frozen states are republished untouched.
        let reading = snapshot.last_reading;
        drop(guard);
        publish(shared, reading);
        return false;
    }

    let server_now = OffsetDateTime::now_utc() - Duration::milliseconds(snapshot.offset_ms);
    let reading = clock::read_anchors(&snapshot.response.anchors(), server_now);

    let drift = (reading.remaining_seconds - snapshot.last_reading.remaining_seconds).abs();
    snapshot.last_reading = reading;
    drop(guard);

    publish(shared, reading);

    // A jump between consecutive ticks means the local clock moved under us;
    // a zero reading means the server may already have finished the event.
    drift > shared.settings.max_drift_seconds || reading.remaining_seconds == 0
}

fn publish(shared: &SyncShared, reading: TimerReading) {
    let _ = shared.ticks.send(reading);
    shared.status.send_if_modified(|current| {
        if *current != reading.status {
            *current = reading.status;
            true
        } else {
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedFeed {
        responses: Vec<TimerSyncResponse>,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(responses: Vec<TimerSyncResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TimerFeed for ScriptedFeed {
        fn fetch(
            &self,
            _event_id: Uuid,
        ) -> BoxFuture<'static, Result<TimerSyncResponse, SyncError>> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            // The last scripted response repeats forever.
            let response = self
                .responses
                .get(index)
                .or_else(|| self.responses.last())
                .cloned();
            Box::pin(async move {
                response.ok_or_else(|| SyncError::Feed("script exhausted".into()))
            })
        }
    }

    fn running_response(event_id: Uuid, started_secs_ago: i64, duration: i64) -> TimerSyncResponse {
        let now = OffsetDateTime::now_utc();
        TimerSyncResponse {
            event_id,
            status: EventStatus::Running,
            duration_seconds: duration,
            elapsed_seconds: started_secs_ago,
            remaining_seconds: duration - started_secs_ago,
            is_running: duration > started_secs_ago,
            started_at: Some(now - Duration::seconds(started_secs_ago)),
            paused_at: None,
            accumulated_pause_seconds: 0,
            server_time_ms: unix_millis(now),
        }
    }

    fn finished_response(event_id: Uuid, duration: i64) -> TimerSyncResponse {
        let now = OffsetDateTime::now_utc();
        TimerSyncResponse {
            event_id,
            status: EventStatus::Finished,
            duration_seconds: duration,
            elapsed_seconds: duration,
            remaining_seconds: 0,
            is_running: false,
            started_at: Some(now - Duration::seconds(duration)),
            paused_at: None,
            accumulated_pause_seconds: 0,
            server_time_ms: unix_millis(now),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_sync_publishes_the_server_reading() {
        let event_id = Uuid::new_v4();
        let feed = ScriptedFeed::new(vec![running_response(event_id, 100, 300)]);
        let sync = TimerSync::start(event_id, feed.clone(), SyncSettings::default());
        let mut ticks = sync.ticks();

        ticks.changed().await.unwrap();
        let reading = *ticks.borrow();
        assert_eq!(reading.status, EventStatus::Running);
        // Wall time barely moves under a paused runtime, so the extrapolated
        // reading stays within a tick of the scripted one.
        assert!(reading.remaining_seconds >= 198 && reading.remaining_seconds <= 200);
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_keep_flowing_between_syncs() {
        let event_id = Uuid::new_v4();
        let feed = ScriptedFeed::new(vec![running_response(event_id, 10, 300)]);
        let sync = TimerSync::start(event_id, feed.clone(), SyncSettings::default());
        let mut ticks = sync.ticks();

        for _ in 0..3 {
            ticks.changed().await.unwrap();
        }
        // Three ticks in, still only the initial poll.
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_watch_fires_only_on_change() {
        let event_id = Uuid::new_v4();
        let feed = ScriptedFeed::new(vec![
            running_response(event_id, 10, 300),
            finished_response(event_id, 300),
        ]);
        let sync = TimerSync::start(event_id, feed, SyncSettings::default());
        let mut status = sync.status_changes();

        status.changed().await.unwrap();
        assert_eq!(*status.borrow(), EventStatus::Running);

        // The second poll flips the status to finished.
        status.changed().await.unwrap();
        assert_eq!(*status.borrow(), EventStatus::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_reading_forces_an_early_resync() {
        let event_id = Uuid::new_v4();
        // Countdown already exhausted but the server still says running.
        let feed = ScriptedFeed::new(vec![
            running_response(event_id, 300, 300),
            finished_response(event_id, 300),
        ]);
        let sync = TimerSync::start(event_id, feed.clone(), SyncSettings::default());
        let mut status = sync.status_changes();

        // The finished status arrives well before the 10 s sync interval.
        tokio::time::timeout(StdDuration::from_secs(5), async {
            loop {
                status.changed().await.unwrap();
                if *status.borrow() == EventStatus::Finished {
                    break;
                }
            }
        })
        .await
        .expect("expected an early resync to pick up the finished status");
        assert!(feed.calls() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_resync_polls_immediately() {
        let event_id = Uuid::new_v4();
        let feed = ScriptedFeed::new(vec![running_response(event_id, 10, 300)]);
        let sync = TimerSync::start(event_id, feed.clone(), SyncSettings::default());
        let mut ticks = sync.ticks();

        ticks.changed().await.unwrap();
        assert_eq!(feed.calls(), 1);

        sync.resync();
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_reading_is_republished_unchanged() {
        let event_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let response = TimerSyncResponse {
            event_id,
            status: EventStatus::Paused,
            duration_seconds: 300,
            elapsed_seconds: 120,
            remaining_seconds: 180,
            is_running: false,
            started_at: Some(now - Duration::seconds(120)),
            paused_at: Some(now),
            accumulated_pause_seconds: 0,
            server_time_ms: unix_millis(now),
        };
        let feed = ScriptedFeed::new(vec![response]);
        let sync = TimerSync::start(event_id, feed, SyncSettings::default());
        let mut ticks = sync.ticks();

        for _ in 0..3 {
            ticks.changed().await.unwrap();
            let reading = *ticks.borrow();
            assert_eq!(reading.status, EventStatus::Paused);
            assert_eq!(reading.remaining_seconds, 180);
        }
    }
}
